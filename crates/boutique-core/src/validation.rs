//! # Validation Module
//!
//! Input validation for checkout and catalog identifiers. Runs before
//! business logic so malformed requests never reach a transaction.

use crate::error::ValidationError;
use crate::types::OrderLineInput;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scalar Validators
// =============================================================================

/// Validates a line quantity: positive and within the per-line cap.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity" });
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a SKU: non-empty, bounded, alphanumeric plus `-` and `_`.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required { field: "sku" });
    }
    if sku.len() > 80 {
        return Err(ValidationError::TooLong {
            field: "sku",
            max: 80,
        });
    }
    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku",
            reason: "only letters, numbers, hyphens, and underscores",
        });
    }
    Ok(())
}

/// Validates a size label ("M", "42", "38-wide").
pub fn validate_size_label(size: &str) -> ValidationResult<()> {
    let size = size.trim();

    if size.is_empty() {
        return Err(ValidationError::Required { field: "size" });
    }
    if size.len() > 16 {
        return Err(ValidationError::TooLong {
            field: "size",
            max: 16,
        });
    }
    Ok(())
}

// =============================================================================
// Order Line Validation
// =============================================================================

/// Validates a checkout line list: non-empty, bounded, positive quantities,
/// no duplicate (product, variant, size) tuples.
pub fn validate_order_lines(lines: &[OrderLineInput]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required { field: "items" });
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items",
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    let mut seen: Vec<(&str, Option<&str>, Option<&str>)> = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        if let Some(size) = &line.size_label {
            validate_size_label(size)?;
        }

        let key = (
            line.product_id.as_str(),
            line.variant_id.as_deref(),
            line.size_label.as_deref(),
        );
        if seen.contains(&key) {
            return Err(ValidationError::Duplicate {
                what: match (&line.variant_id, &line.size_label) {
                    (Some(v), _) => format!("product {} variant {}", line.product_id, v),
                    (None, Some(s)) => format!("product {} size {}", line.product_id, s),
                    (None, None) => format!("product {}", line.product_id),
                },
            });
        }
        seen.push(key);
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
