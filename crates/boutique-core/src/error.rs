//! # Error Types
//!
//! Domain-specific error types for boutique-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  boutique-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  boutique-db errors                                                     │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  boutique-engine errors                                                 │
//! │  └── EngineError      - What callers of the lifecycle service see       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual impls
//! 2. Context in every message (SKU, status, quantities)
//! 3. Errors are enum variants, never bare strings
//! 4. Business failures are detected before any mutation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Stock Shortage
// =============================================================================

/// One line that cannot be satisfied from current stock.
///
/// Availability checks collect every short line, not just the first, so the
/// caller can adjust all quantities in one round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub sku: String,
    pub requested: i64,
    pub available: i64,
}

impl fmt::Display for StockShortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: requested {}, available {}",
            self.sku, self.requested, self.available
        )
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order is past DRAFT and the requested mutation is no longer
    /// allowed. Also the state-machine level idempotency guard: a second
    /// confirm lands here because the first one moved the status.
    #[error("order is {status}, only draft orders allow this operation")]
    NotDraft { status: OrderStatus },

    /// Disallowed status change: unknown administrative target or an attempt
    /// to leave a terminal state.
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// One or more lines exceed available stock. Carries every short line.
    #[error("insufficient stock for {} line(s)", .shortages.len())]
    InsufficientStock { shortages: Vec<StockShortage> },

    /// Confirm requires shipping method, payment method and (for non-pickup
    /// shipping) an address.
    #[error("{what} must be set before confirming")]
    MissingPrerequisite { what: &'static str },

    /// A variant-less line targets a product that carries size variants, so
    /// there is no unambiguous stock bucket to charge.
    #[error("product {sku} has size variants, order lines must name one")]
    VariantRequired { sku: String },

    /// Input validation failure (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Invalid format (bad characters, malformed id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// The same line appears more than once.
    #[error("duplicate order line for {what}")]
    Duplicate { what: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortage_display() {
        let short = StockShortage {
            sku: "DRESS-M".to_string(),
            requested: 3,
            available: 2,
        };
        assert_eq!(short.to_string(), "DRESS-M: requested 3, available 2");
    }

    #[test]
    fn test_insufficient_stock_counts_lines() {
        let err = CoreError::InsufficientStock {
            shortages: vec![
                StockShortage {
                    sku: "DRESS-M".into(),
                    requested: 3,
                    available: 2,
                },
                StockShortage {
                    sku: "SHOE-42".into(),
                    requested: 1,
                    available: 0,
                },
            ],
        };
        assert_eq!(err.to_string(), "insufficient stock for 2 line(s)");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive { field: "quantity" };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_transition_message_uses_status_names() {
        let err = CoreError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Paid,
        };
        assert_eq!(err.to_string(), "transition delivered -> paid is not allowed");
    }
}
