//! # Order Repository
//!
//! Database operations for orders, order items and the status history log.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE DRAFT                                                        │
//! │     └── insert_order() + insert_item()* → Order { status: Draft }       │
//! │                                                                         │
//! │  2. SELECT FULFILLMENT                                                  │
//! │     └── set_address() / set_shipping_method() / set_payment_method()    │
//! │     └── update_totals() after each change                               │
//! │                                                                         │
//! │  3. CONFIRM (boutique-engine)                                           │
//! │     └── stock deduction + set_status_with_history() in one transaction  │
//! │                                                                         │
//! │  4. ADMINISTRATE                                                        │
//! │     └── transitions append history; cancel/refund restore stock         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state-changing method takes `&mut SqliteConnection` so the engine
//! decides the transaction boundary. The first write of such a transaction
//! should be [`OrderRepository::touch`]: it acquires SQLite's write lock up
//! front, so later reads in the same transaction see the latest committed
//! state instead of a stale snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use boutique_core::{Order, OrderFilter, OrderItem, OrderStatus, OrderStatusHistory, OrderTotals};

const ORDER_COLUMNS: &str = "id, user_id, status, currency, total_items, subtotal_cents, \
     shipping_cost_cents, payment_fee_cents, tax_total_cents, grand_total_cents, \
     shipping_method_id, payment_method_id, shipping_address_id, shipping_address_snapshot, \
     placed_at, paid_at, canceled_at, external_payment_id, external_payment_status, \
     notes, customer_note, inventory_deducted, inventory_restored, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, name_snapshot, sku_snapshot, \
     unit_price_cents, quantity, line_subtotal_cents";

/// Unpaged listings are capped to keep admin queries bounded.
const UNPAGED_LIST_LIMIT: u32 = 200;

/// One page of an order listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Pool-backed reads
    // =========================================================================

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order by ID, scoped to its owner.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all items of an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the status history of an order, newest first.
    pub async fn history(&self, order_id: &str) -> DbResult<Vec<OrderStatusHistory>> {
        let rows = sqlx::query_as::<_, OrderStatusHistory>(
            r#"
            SELECT id, order_id, old_status, new_status, changed_by, reason, changed_at
            FROM order_status_history
            WHERE order_id = ?1
            ORDER BY changed_at DESC, id DESC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Latest draft order of a user, if any.
    pub async fn draft_latest(&self, user_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = ?1 AND status = 'draft' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Filtered, optionally paged, administrative listing. Newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<OrderPage> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE 1 = 1");
        apply_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1 = 1"));
        apply_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");

        let (page, page_size) = match (filter.page, filter.page_size) {
            (Some(p), Some(s)) if p >= 1 && s >= 1 => (p, s),
            _ => (1, UNPAGED_LIST_LIMIT),
        };
        qb.push(" LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1) * page_size);

        let orders = qb
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            page_size,
        })
    }

    /// Records the payment processor's reference and last reported status.
    pub async fn record_external_payment(
        &self,
        order_id: &str,
        external_id: &str,
        external_status: &str,
    ) -> DbResult<()> {
        debug!(order_id = %order_id, external_id = %external_id, status = %external_status,
               "Recording external payment status");

        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE orders
            SET external_payment_id = ?2, external_payment_status = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(external_id)
        .bind(external_status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transactional operations
    // =========================================================================

    /// First write of every order transaction: bumps `updated_at`, thereby
    /// taking the write lock before anything is read. Returns `false` when
    /// the order does not exist.
    pub async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE orders SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads an order inside the caller's transaction.
    pub async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(order)
    }

    /// Loads order items inside the caller's transaction.
    pub async fn load_items(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(items)
    }

    /// Inserts a new order row.
    pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, user_id = %order.user_id, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, currency,
                total_items, subtotal_cents, shipping_cost_cents, payment_fee_cents,
                tax_total_cents, grand_total_cents,
                shipping_method_id, payment_method_id, shipping_address_id,
                shipping_address_snapshot,
                placed_at, paid_at, canceled_at,
                external_payment_id, external_payment_status,
                notes, customer_note,
                inventory_deducted, inventory_restored,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(&order.currency)
        .bind(order.total_items)
        .bind(order.subtotal_cents)
        .bind(order.shipping_cost_cents)
        .bind(order.payment_fee_cents)
        .bind(order.tax_total_cents)
        .bind(order.grand_total_cents)
        .bind(&order.shipping_method_id)
        .bind(&order.payment_method_id)
        .bind(&order.shipping_address_id)
        .bind(&order.shipping_address_snapshot)
        .bind(order.placed_at)
        .bind(order.paid_at)
        .bind(order.canceled_at)
        .bind(&order.external_payment_id)
        .bind(&order.external_payment_status)
        .bind(&order.notes)
        .bind(&order.customer_note)
        .bind(order.inventory_deducted)
        .bind(order.inventory_restored)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts a line item. Product details are already frozen on the item
    /// (snapshot pattern) so later catalog edits cannot rewrite history.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        debug!(order_id = %item.order_id, sku = %item.sku_snapshot, "Inserting order item");

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, variant_id,
                name_snapshot, sku_snapshot,
                unit_price_cents, quantity, line_subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(&item.name_snapshot)
        .bind(&item.sku_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_subtotal_cents)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes recomputed totals onto the order row.
    pub async fn update_totals(
        conn: &mut SqliteConnection,
        order_id: &str,
        totals: &OrderTotals,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE orders SET
                total_items = ?2,
                subtotal_cents = ?3,
                shipping_cost_cents = ?4,
                payment_fee_cents = ?5,
                tax_total_cents = ?6,
                grand_total_cents = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(totals.total_items)
        .bind(totals.subtotal.cents())
        .bind(totals.shipping_cost.cents())
        .bind(totals.payment_fee.cents())
        .bind(totals.tax_total.cents())
        .bind(totals.grand_total.cents())
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Assigns the shipping method.
    pub async fn set_shipping_method(
        conn: &mut SqliteConnection,
        order_id: &str,
        method_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE orders SET shipping_method_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(method_id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Assigns the payment method.
    pub async fn set_payment_method(
        conn: &mut SqliteConnection,
        order_id: &str,
        method_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE orders SET payment_method_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(method_id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Assigns the shipping address and freezes its snapshot in one write.
    pub async fn set_address(
        conn: &mut SqliteConnection,
        order_id: &str,
        address_id: &str,
        snapshot_json: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE orders
            SET shipping_address_id = ?2, shipping_address_snapshot = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(address_id)
        .bind(snapshot_json)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Moves the order to a new status and appends the audit row, as one
    /// unit inside the caller's transaction.
    pub async fn set_status_with_history(
        conn: &mut SqliteConnection,
        order_id: &str,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Option<&str>,
        reason: Option<&str>,
    ) -> DbResult<()> {
        debug!(order_id = %order_id, from = %old_status, to = %new_status, "Order transition");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO order_status_history (
                id, order_id, old_status, new_status, changed_by, reason, changed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order_id)
        .bind(old_status)
        .bind(new_status)
        .bind(changed_by)
        .bind(reason)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(new_status)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Flips the durable deduction guard. Exactly-once by construction: the
    /// engine re-reads the flag in the same transaction before deducting.
    pub async fn mark_inventory_deducted(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE orders SET inventory_deducted = 1, updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Flips the durable restoration guard.
    pub async fn mark_inventory_restored(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE orders SET inventory_restored = 1, updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(now)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Stamps `placed_at`.
    pub async fn set_placed_at(
        conn: &mut SqliteConnection,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET placed_at = ?2, updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Stamps `paid_at`.
    pub async fn set_paid_at(
        conn: &mut SqliteConnection,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET paid_at = ?2, updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Stamps `canceled_at`.
    pub async fn set_canceled_at(
        conn: &mut SqliteConnection,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET canceled_at = ?2, updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(at)
            .execute(conn)
            .await?;

        Ok(())
    }
}

/// Appends the WHERE clauses shared by the listing and its count query.
fn apply_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND user_id = ");
        qb.push_bind(user_id.clone());
    }
    if let Some(q) = &filter.query {
        let like = format!("%{}%", q);
        qb.push(" AND (id = ");
        qb.push_bind(q.clone());
        qb.push(" OR notes LIKE ");
        qb.push_bind(like.clone());
        qb.push(" OR customer_note LIKE ");
        qb.push_bind(like);
        qb.push(")");
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND created_at >= ");
        qb.push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND created_at <= ");
        qb.push_bind(to);
    }
}

/// Generates a new order item ID.
pub fn generate_order_item_id() -> String {
    Uuid::new_v4().to_string()
}
