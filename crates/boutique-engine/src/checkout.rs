//! # Checkout Line Resolution
//!
//! Turns requested `(product, variant-or-size, quantity)` tuples into frozen
//! order items. Runs inside the start() transaction so an invalid product
//! anywhere in the list rolls the whole order back.

use sqlx::SqliteConnection;
use uuid::Uuid;

use boutique_core::{OrderItem, OrderLineInput};
use boutique_db::ProductRepository;

use crate::error::{EngineError, EngineResult};

/// Resolves checkout lines into order items with frozen snapshots.
///
/// Resolution rules:
/// - the product must exist and be active, otherwise the whole operation
///   fails;
/// - a `variant_id` must belong to the product, otherwise the whole
///   operation fails;
/// - a `size_label` miss is NOT an error - the line is kept variant-less
///   against the base product, since not all products carry variants;
/// - `unit_price`, name and sku are copied at this instant and never updated
///   from the catalog again.
pub(crate) async fn resolve_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &[OrderLineInput],
) -> EngineResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        let product = ProductRepository::load_active(conn, &line.product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("product", line.product_id.as_str()))?;

        let variant = match (&line.variant_id, &line.size_label) {
            (Some(variant_id), _) => Some(
                ProductRepository::load_variant(conn, variant_id, &product.id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::not_found("product variant", variant_id.as_str())
                    })?,
            ),
            (None, Some(size)) => {
                ProductRepository::load_variant_by_size(conn, &product.id, size).await?
            }
            (None, None) => None,
        };

        let sku_snapshot = match &variant {
            Some(v) => v
                .sku
                .clone()
                .unwrap_or_else(|| format!("{}-{}", product.sku, v.size)),
            None => product.sku.clone(),
        };

        let unit_price_cents = product.price_cents;

        items.push(OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: product.id,
            variant_id: variant.map(|v| v.id),
            name_snapshot: product.name,
            sku_snapshot,
            unit_price_cents,
            quantity: line.quantity,
            line_subtotal_cents: unit_price_cents * line.quantity,
        });
    }

    Ok(items)
}
