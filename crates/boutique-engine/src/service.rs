//! # Order Lifecycle Service
//!
//! Every boundary operation of the order engine, each one a single SQLite
//! transaction.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart ──(start)──► Order DRAFT with frozen line items                   │
//! │       │                                                                 │
//! │       ▼  set_address / set_shipping_method / set_payment_method         │
//! │  totals recomputed after each change                                    │
//! │       │                                                                 │
//! │       ▼  confirm()                                                      │
//! │  reservation engine deducts stock, status leaves DRAFT,                 │
//! │  cart cleared best-effort, gateway status recorded                      │
//! │       │                                                                 │
//! │       ▼  cancel() / transition()                                        │
//! │  status transition controller; cancel/refund restore stock              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Each mutation begins its transaction with a write (`OrderRepository::touch`)
//! so SQLite's single-writer lock is taken before any read. Two
//! confirms racing for the last unit therefore serialize: the second one
//! sees the first one's committed deduction and fails the availability
//! check. Lock waits beyond the configured busy timeout surface as
//! [`EngineError::ConflictRetryable`] with no state changed.

use chrono::Utc;
use tracing::{debug, info, warn};

use boutique_core::{
    can_cancel, compute_totals, post_confirm_status, validate_admin_transition, AddressSnapshot,
    AdminTransition, CoreError, Order, OrderFilter, OrderItem, OrderLineInput, OrderStatus,
    OrderStatusHistory, OrderTotals, PaymentMethodKind,
};
use boutique_db::{
    AddressRepository, Database, DbError, MethodRepository, OrderPage, OrderRepository,
};

use crate::checkout;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{NoGateway, PaymentGateway};
use crate::reservation;

// =============================================================================
// Service
// =============================================================================

/// The order lifecycle service.
///
/// Cloning is cheap; clones share the database pool and gateway.
#[derive(Debug, Clone)]
pub struct OrderService<G = NoGateway> {
    db: Database,
    gateway: G,
}

impl OrderService<NoGateway> {
    /// Creates a service without a payment gateway (offline/COD stores).
    pub fn new(db: Database) -> Self {
        OrderService {
            db,
            gateway: NoGateway,
        }
    }
}

impl<G: PaymentGateway> OrderService<G> {
    /// Creates a service backed by a payment gateway.
    pub fn with_gateway(db: Database, gateway: G) -> Self {
        OrderService { db, gateway }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Starts a draft order from explicit lines.
    ///
    /// Prices, names and SKUs are frozen at this instant; no stock is
    /// touched. Any invalid product or variant fails the whole operation.
    pub async fn start(&self, user_id: &str, lines: &[OrderLineInput]) -> EngineResult<Order> {
        boutique_core::validation::validate_order_lines(lines).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await?;

        let order = Order::draft(user_id, Utc::now());
        OrderRepository::insert_order(&mut *tx, &order).await?;

        let items = checkout::resolve_lines(&mut *tx, &order.id, lines).await?;
        for item in &items {
            OrderRepository::insert_item(&mut *tx, item).await?;
        }

        let totals = compute_totals(&items, None, None);
        OrderRepository::update_totals(&mut *tx, &order.id, &totals).await?;

        tx.commit().await?;

        info!(order_id = %order.id, user_id = %user_id, lines = items.len(),
              "Draft order started");

        self.fetch_order(user_id, &order.id).await
    }

    /// Starts a draft order from the user's stored cart.
    pub async fn start_from_cart(&self, user_id: &str) -> EngineResult<Order> {
        let carts = self.db.carts();
        let cart = carts.get_or_create(user_id).await?;
        let lines: Vec<OrderLineInput> = carts
            .items(&cart.id)
            .await?
            .into_iter()
            .map(|it| OrderLineInput {
                product_id: it.product_id,
                variant_id: it.variant_id,
                size_label: it.size_label,
                quantity: it.quantity,
            })
            .collect();

        self.start(user_id, &lines).await
    }

    // =========================================================================
    // Draft mutation
    // =========================================================================

    /// Assigns a shipping address and freezes its snapshot. DRAFT only.
    pub async fn set_address(
        &self,
        user_id: &str,
        order_id: &str,
        address_id: &str,
    ) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        let order = load_owned_draft(&mut tx, order_id, user_id).await?;

        let address = AddressRepository::load_for_user(&mut *tx, address_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("address", address_id))?;

        let snapshot = AddressSnapshot::from(&address);
        let snapshot_json = serde_json::to_string(&snapshot)
            .map_err(|e| EngineError::Db(DbError::Internal(e.to_string())))?;

        OrderRepository::set_address(&mut *tx, &order.id, &address.id, &snapshot_json).await?;
        refresh_totals(&mut tx, &order.id).await?;

        tx.commit().await?;

        debug!(order_id = %order.id, address_id = %address.id, "Shipping address set");

        self.fetch_order(user_id, order_id).await
    }

    /// Assigns an active shipping method and recomputes totals. DRAFT only.
    pub async fn set_shipping_method(
        &self,
        user_id: &str,
        order_id: &str,
        method_id: &str,
    ) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        let order = load_owned_draft(&mut tx, order_id, user_id).await?;

        let method = MethodRepository::load_active_shipping(&mut *tx, method_id)
            .await?
            .ok_or_else(|| EngineError::not_found("shipping method", method_id))?;

        OrderRepository::set_shipping_method(&mut *tx, &order.id, &method.id).await?;
        refresh_totals(&mut tx, &order.id).await?;

        tx.commit().await?;

        debug!(order_id = %order.id, method = %method.code, "Shipping method set");

        self.fetch_order(user_id, order_id).await
    }

    /// Assigns an active payment method and recomputes totals. DRAFT only.
    pub async fn set_payment_method(
        &self,
        user_id: &str,
        order_id: &str,
        method_id: &str,
    ) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        let order = load_owned_draft(&mut tx, order_id, user_id).await?;

        let method = MethodRepository::load_active_payment(&mut *tx, method_id)
            .await?
            .ok_or_else(|| EngineError::not_found("payment method", method_id))?;

        OrderRepository::set_payment_method(&mut *tx, &order.id, &method.id).await?;
        refresh_totals(&mut tx, &order.id).await?;

        tx.commit().await?;

        debug!(order_id = %order.id, method = %method.code, "Payment method set");

        self.fetch_order(user_id, order_id).await
    }

    // =========================================================================
    // Confirm
    // =========================================================================

    /// Commits a draft order: validates prerequisites, runs the reservation
    /// engine, and moves the status out of DRAFT - all in one transaction.
    ///
    /// After the commit, the user's cart is cleared best-effort and, for
    /// gateway payments with a reference, the processor's intent status is
    /// recorded on the order. A gateway failure surfaces as
    /// [`EngineError::ExternalPayment`] with the order left confirmed in
    /// PENDING_PAYMENT.
    pub async fn confirm(
        &self,
        user_id: &str,
        order_id: &str,
        gateway_reference: Option<&str>,
    ) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        // Write first: the lock is held before any read below.
        if !OrderRepository::touch(&mut *tx, order_id).await? {
            return Err(EngineError::not_found("order", order_id));
        }
        let order = OrderRepository::load(&mut *tx, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.user_id != user_id {
            return Err(EngineError::not_found("order", order_id));
        }
        if order.status != OrderStatus::Draft {
            // state-machine level idempotency guard for retried confirms
            return Err(CoreError::NotDraft {
                status: order.status,
            }
            .into());
        }

        let Some(shipping_id) = order.shipping_method_id.as_deref() else {
            return Err(CoreError::MissingPrerequisite {
                what: "shipping method",
            }
            .into());
        };
        let Some(payment_id) = order.payment_method_id.as_deref() else {
            return Err(CoreError::MissingPrerequisite {
                what: "payment method",
            }
            .into());
        };
        let shipping = MethodRepository::load_active_shipping(&mut *tx, shipping_id)
            .await?
            .ok_or_else(|| EngineError::not_found("shipping method", shipping_id))?;
        let payment = MethodRepository::load_active_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("payment method", payment_id))?;
        if !shipping.requires_pickup && order.shipping_address_id.is_none() {
            return Err(CoreError::MissingPrerequisite {
                what: "shipping address",
            }
            .into());
        }

        let items = OrderRepository::load_items(&mut *tx, order_id).await?;

        // Durable idempotency guard, re-read within this transaction.
        if !order.inventory_deducted {
            reservation::deduct_inventory(&mut *tx, &items).await?;
            OrderRepository::mark_inventory_deducted(&mut *tx, order_id).await?;
        }

        let now = Utc::now();
        OrderRepository::set_placed_at(&mut *tx, order_id, now).await?;

        let new_status = post_confirm_status(payment.kind);
        OrderRepository::set_status_with_history(
            &mut *tx,
            order_id,
            order.status,
            new_status,
            Some(user_id),
            None,
        )
        .await?;

        refresh_totals(&mut tx, order_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, user_id = %user_id, status = %new_status,
              "Order confirmed");

        // Best-effort side effect: a cart-clear failure must never fail the
        // confirmed order.
        if let Err(e) = self.db.carts().clear(user_id).await {
            warn!(user_id = %user_id, error = %e, "Cart clear after confirm failed");
        }

        if payment.kind == PaymentMethodKind::Gateway {
            if let Some(reference) = gateway_reference {
                match self.gateway.retrieve_status(reference).await {
                    Ok(status) => {
                        self.db
                            .orders()
                            .record_external_payment(order_id, reference, status.as_str())
                            .await?;
                    }
                    Err(e) => {
                        self.db
                            .orders()
                            .record_external_payment(order_id, reference, "error")
                            .await?;
                        return Err(EngineError::ExternalPayment {
                            reference: reference.to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        self.fetch_order(user_id, order_id).await
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels an order, restoring stock when a deduction happened and was
    /// not restored yet. Rejected in terminal states.
    pub async fn cancel(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        if !OrderRepository::touch(&mut *tx, order_id).await? {
            return Err(EngineError::not_found("order", order_id));
        }
        let order = OrderRepository::load(&mut *tx, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.user_id != user_id {
            return Err(EngineError::not_found("order", order_id));
        }
        if !can_cancel(order.status) {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Canceled,
            }
            .into());
        }

        // Both flags re-read in this transaction: restore exactly once, and
        // only when something was actually deducted.
        if order.inventory_deducted && !order.inventory_restored {
            let items = OrderRepository::load_items(&mut *tx, order_id).await?;
            reservation::restore_inventory(&mut *tx, &items).await?;
            OrderRepository::mark_inventory_restored(&mut *tx, order_id).await?;
        }

        let now = Utc::now();
        if order.canceled_at.is_none() {
            OrderRepository::set_canceled_at(&mut *tx, order_id, now).await?;
        }
        OrderRepository::set_status_with_history(
            &mut *tx,
            order_id,
            order.status,
            OrderStatus::Canceled,
            Some(user_id),
            None,
        )
        .await?;

        tx.commit().await?;

        info!(order_id = %order_id, user_id = %user_id, "Order canceled");

        self.fetch_order(user_id, order_id).await
    }

    // =========================================================================
    // Administrative transition
    // =========================================================================

    /// Administrative status change with the same deduction/restoration
    /// guards as confirm and cancel. A self-transition is a no-op success.
    pub async fn transition(
        &self,
        changed_by: Option<&str>,
        order_id: &str,
        new_status: OrderStatus,
        reason: Option<&str>,
    ) -> EngineResult<Order> {
        let mut tx = self.db.pool().begin().await?;

        if !OrderRepository::touch(&mut *tx, order_id).await? {
            return Err(EngineError::not_found("order", order_id));
        }
        let order = OrderRepository::load(&mut *tx, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;

        let effects = match validate_admin_transition(order.status, new_status)? {
            AdminTransition::Noop => {
                // nothing to write; the touched timestamp rolls back
                drop(tx);
                return Ok(order);
            }
            AdminTransition::Apply(effects) => effects,
        };

        // Promotion without a prior confirm deducts here, guarded by the
        // same durable flag; cancel/refund restores symmetrically.
        if effects.deducts_inventory && !order.inventory_deducted {
            let items = OrderRepository::load_items(&mut *tx, order_id).await?;
            reservation::deduct_inventory(&mut *tx, &items).await?;
            OrderRepository::mark_inventory_deducted(&mut *tx, order_id).await?;
        }
        if effects.restores_inventory && order.inventory_deducted && !order.inventory_restored {
            let items = OrderRepository::load_items(&mut *tx, order_id).await?;
            reservation::restore_inventory(&mut *tx, &items).await?;
            OrderRepository::mark_inventory_restored(&mut *tx, order_id).await?;
        }

        let now = Utc::now();
        if effects.marks_paid && order.paid_at.is_none() {
            OrderRepository::set_paid_at(&mut *tx, order_id, now).await?;
        }
        if effects.marks_canceled && order.canceled_at.is_none() {
            OrderRepository::set_canceled_at(&mut *tx, order_id, now).await?;
        }

        OrderRepository::set_status_with_history(
            &mut *tx,
            order_id,
            order.status,
            new_status,
            changed_by,
            reason,
        )
        .await?;

        tx.commit().await?;

        info!(order_id = %order_id, from = %order.status, to = %new_status,
              "Administrative transition applied");

        self.fetch_any(order_id).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order scoped to its owner.
    pub async fn order(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        self.fetch_order(user_id, order_id).await
    }

    /// Gets an order without owner scoping (administrative).
    pub async fn admin_order(&self, order_id: &str) -> EngineResult<Order> {
        self.fetch_any(order_id).await
    }

    /// Items of an order.
    pub async fn order_items(&self, order_id: &str) -> EngineResult<Vec<OrderItem>> {
        Ok(self.db.orders().items(order_id).await?)
    }

    /// The user's latest draft order, if any.
    pub async fn draft_latest(&self, user_id: &str) -> EngineResult<Option<Order>> {
        Ok(self.db.orders().draft_latest(user_id).await?)
    }

    /// Filtered administrative listing.
    pub async fn list_orders(&self, filter: &OrderFilter) -> EngineResult<OrderPage> {
        Ok(self.db.orders().list(filter).await?)
    }

    /// Status history of an order, newest first.
    pub async fn history(&self, order_id: &str) -> EngineResult<Vec<OrderStatusHistory>> {
        Ok(self.db.orders().history(order_id).await?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn fetch_order(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))
    }

    async fn fetch_any(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Opens an owner-scoped draft order for mutation: touch (write lock), load,
/// check ownership and DRAFT status.
async fn load_owned_draft(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order_id: &str,
    user_id: &str,
) -> EngineResult<Order> {
    if !OrderRepository::touch(&mut **tx, order_id).await? {
        return Err(EngineError::not_found("order", order_id));
    }
    let order = OrderRepository::load(&mut **tx, order_id)
        .await?
        .ok_or_else(|| EngineError::not_found("order", order_id))?;
    if order.user_id != user_id {
        return Err(EngineError::not_found("order", order_id));
    }
    if order.status != OrderStatus::Draft {
        return Err(CoreError::NotDraft {
            status: order.status,
        }
        .into());
    }
    Ok(order)
}

/// Recomputes and persists totals from the order's current items and
/// methods, inside the caller's transaction.
async fn refresh_totals(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order_id: &str,
) -> EngineResult<OrderTotals> {
    let order = OrderRepository::load(&mut **tx, order_id)
        .await?
        .ok_or_else(|| EngineError::not_found("order", order_id))?;
    let items = OrderRepository::load_items(&mut **tx, order_id).await?;

    let shipping = match order.shipping_method_id.as_deref() {
        Some(id) => MethodRepository::load_active_shipping(&mut **tx, id).await?,
        None => None,
    };
    let payment = match order.payment_method_id.as_deref() {
        Some(id) => MethodRepository::load_active_payment(&mut **tx, id).await?,
        None => None,
    };

    let totals = compute_totals(&items, shipping.as_ref(), payment.as_ref());
    OrderRepository::update_totals(&mut **tx, order_id, &totals).await?;

    Ok(totals)
}
