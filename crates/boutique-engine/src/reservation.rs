//! # Stock Reservation Engine
//!
//! Atomic deduction and restoration of stock for an order's items. Both
//! passes run on the caller's transaction: the status write that triggers
//! them commits or rolls back together with every stock mutation.
//!
//! ## Deduction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pass 1 - availability (no mutation)                                    │
//! │     per item: variant.stock >= qty, or product.stock >= qty for         │
//! │     variant-less lines. EVERY short line is collected so the caller     │
//! │     can fix all quantities at once. Any shortage aborts the whole       │
//! │     transaction with nothing deducted.                                  │
//! │                                                                         │
//! │  Pass 2 - mutation                                                      │
//! │     guarded decrement per variant (a lost race aborts as retryable),    │
//! │     then per touched product: stock = SUM(variants). Variant-less       │
//! │     lines subtract directly from product stock, floored at zero.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A variant-less line is only chargeable while its product has no size
//! variants; if variants appeared since the order was drafted there is no
//! unambiguous bucket to take the units from, and the pass fails instead of
//! guessing. Restoration puts units back through the same buckets they were
//! taken from and must always succeed.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::SqliteConnection;
use tracing::debug;

use boutique_core::{CoreError, OrderItem, StockShortage};
use boutique_db::ProductRepository;

use crate::error::{EngineError, EngineResult};

/// Checks availability for every item and deducts stock.
///
/// Caller contract: runs inside the order's transaction, and only when the
/// order's `inventory_deducted` flag - re-read in that same transaction -
/// is false.
pub(crate) async fn deduct_inventory(
    conn: &mut SqliteConnection,
    items: &[OrderItem],
) -> EngineResult<()> {
    let mut shortages: Vec<StockShortage> = Vec::new();
    // products reached through variants get recomputed from the variant sum
    let mut variant_products: BTreeSet<String> = BTreeSet::new();
    // variant-less consumption, summed per product
    let mut direct: BTreeMap<String, i64> = BTreeMap::new();

    // Pass 1: availability. Nothing is mutated until every line clears.
    for item in items {
        match &item.variant_id {
            Some(variant_id) => {
                let variant =
                    ProductRepository::load_variant(conn, variant_id, &item.product_id)
                        .await?
                        .ok_or_else(|| {
                            EngineError::not_found("product variant", variant_id.as_str())
                        })?;
                if variant.stock < item.quantity {
                    shortages.push(StockShortage {
                        sku: item.sku_snapshot.clone(),
                        requested: item.quantity,
                        available: variant.stock,
                    });
                }
                variant_products.insert(item.product_id.clone());
            }
            None => {
                let product = ProductRepository::load(conn, &item.product_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("product", item.product_id.as_str()))?;
                if ProductRepository::variant_count(conn, &product.id).await? > 0 {
                    return Err(CoreError::VariantRequired { sku: product.sku }.into());
                }
                if product.stock < item.quantity {
                    shortages.push(StockShortage {
                        sku: item.sku_snapshot.clone(),
                        requested: item.quantity,
                        available: product.stock,
                    });
                }
                *direct.entry(product.id).or_insert(0) += item.quantity;
            }
        }
    }

    if !shortages.is_empty() {
        debug!(short_lines = shortages.len(), "Insufficient stock, aborting");
        return Err(CoreError::InsufficientStock { shortages }.into());
    }

    // Pass 2: mutate. The decrement re-checks stock; losing that race means
    // a concurrent transaction consumed the units after our availability
    // pass, so the whole operation aborts as retryable.
    for item in items {
        if let Some(variant_id) = &item.variant_id {
            let deducted =
                ProductRepository::decrement_variant_stock(conn, variant_id, item.quantity)
                    .await?;
            if !deducted {
                return Err(EngineError::ConflictRetryable);
            }
        }
    }

    for product_id in &variant_products {
        ProductRepository::recompute_product_stock(conn, product_id).await?;
    }
    for (product_id, quantity) in &direct {
        ProductRepository::deduct_product_stock(conn, product_id, *quantity).await?;
    }

    debug!(
        lines = items.len(),
        products = variant_products.len() + direct.len(),
        "Stock deducted"
    );

    Ok(())
}

/// Restores a prior deduction: the exact reverse of [`deduct_inventory`].
///
/// Caller contract: runs inside the order's transaction, and only when
/// `inventory_deducted && !inventory_restored` - both re-read in that same
/// transaction.
pub(crate) async fn restore_inventory(
    conn: &mut SqliteConnection,
    items: &[OrderItem],
) -> EngineResult<()> {
    let mut variant_products: BTreeSet<String> = BTreeSet::new();
    let mut direct: BTreeMap<String, i64> = BTreeMap::new();

    for item in items {
        match &item.variant_id {
            Some(variant_id) => {
                ProductRepository::increment_variant_stock(conn, variant_id, item.quantity)
                    .await?;
                variant_products.insert(item.product_id.clone());
            }
            None => {
                *direct.entry(item.product_id.clone()).or_insert(0) += item.quantity;
            }
        }
    }

    for product_id in &variant_products {
        ProductRepository::recompute_product_stock(conn, product_id).await?;
    }
    // direct add-back, even if the product has grown variants since: the
    // units were taken from the product bucket, so that is where they return
    for (product_id, quantity) in &direct {
        ProductRepository::restore_product_stock(conn, product_id, *quantity).await?;
    }

    debug!(lines = items.len(), "Stock restored");

    Ok(())
}
