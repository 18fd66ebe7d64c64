//! # Order Status State Machine
//!
//! Pure transition rules for [`OrderStatus`]. The database layer persists
//! whatever this module approves; nothing here performs I/O.
//!
//! ## Rules
//! - DELIVERED, CANCELED and REFUNDED are terminal.
//! - Administrative transitions are restricted to a fixed target set.
//! - A self-transition (new == old) is a no-op success, not an error.
//! - CANCELED/REFUNDED trigger inventory restoration; AWAITING_DISPATCH/PAID
//!   trigger deduction when the order was never committed through confirm.

use std::fmt;

use crate::error::CoreError;
use crate::types::{OrderStatus, PaymentMethodKind};

/// Targets an administrator may request explicitly.
///
/// SHIPPED is driven by the fulfillment integration, DRAFT and
/// PENDING_PAYMENT only ever arise from checkout itself.
pub const ADMIN_TRANSITION_TARGETS: [OrderStatus; 5] = [
    OrderStatus::AwaitingDispatch,
    OrderStatus::Delivered,
    OrderStatus::Canceled,
    OrderStatus::Refunded,
    OrderStatus::Paid,
];

impl OrderStatus {
    /// Terminal states admit no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Canceled | OrderStatus::Refunded
        )
    }

    /// Stable snake_case name, identical to the database encoding.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::AwaitingDispatch => "awaiting_dispatch",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Administrative Transitions
// =============================================================================

/// Side effects a transition carries besides the status write itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    /// Run the reservation engine's deduction pass (guarded by the
    /// `inventory_deducted` flag).
    pub deducts_inventory: bool,
    /// Run the restoration pass (guarded by `inventory_restored`).
    pub restores_inventory: bool,
    /// Stamp `paid_at` when it is still unset.
    pub marks_paid: bool,
    /// Stamp `canceled_at` when it is still unset.
    pub marks_canceled: bool,
}

/// Outcome of validating an administrative transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTransition {
    /// new == old: succeed without writing anything.
    Noop,
    /// Apply the transition with these side effects.
    Apply(TransitionEffects),
}

/// Validates an explicit administrative status change.
///
/// Fails with [`CoreError::InvalidTransition`] when the target is outside
/// the fixed set or the order is already in a terminal state.
pub fn validate_admin_transition(
    from: OrderStatus,
    to: OrderStatus,
) -> Result<AdminTransition, CoreError> {
    if from == to {
        return Ok(AdminTransition::Noop);
    }
    if !ADMIN_TRANSITION_TARGETS.contains(&to) || from.is_terminal() {
        return Err(CoreError::InvalidTransition { from, to });
    }
    Ok(AdminTransition::Apply(transition_effects(to)))
}

/// Maps a transition target to its inventory and timestamp side effects.
pub fn transition_effects(to: OrderStatus) -> TransitionEffects {
    match to {
        OrderStatus::AwaitingDispatch => TransitionEffects {
            deducts_inventory: true,
            ..TransitionEffects::default()
        },
        OrderStatus::Paid => TransitionEffects {
            deducts_inventory: true,
            marks_paid: true,
            ..TransitionEffects::default()
        },
        // Marking delivered implies the order was paid along the way.
        OrderStatus::Delivered => TransitionEffects {
            marks_paid: true,
            ..TransitionEffects::default()
        },
        OrderStatus::Canceled => TransitionEffects {
            restores_inventory: true,
            marks_canceled: true,
            ..TransitionEffects::default()
        },
        OrderStatus::Refunded => TransitionEffects {
            restores_inventory: true,
            ..TransitionEffects::default()
        },
        _ => TransitionEffects::default(),
    }
}

/// Whether a customer cancellation is still possible from this state.
#[inline]
pub fn can_cancel(status: OrderStatus) -> bool {
    !status.is_terminal()
}

// =============================================================================
// Post-Confirm Status
// =============================================================================

/// The status an order enters when confirm commits it, by payment kind.
///
/// Every kind currently lands in PENDING_PAYMENT: gateway and offline
/// payments settle later, and cash-on-delivery stays pending until
/// fulfillment rather than jumping straight to dispatch. PAID is only ever
/// set by an explicit payment confirmation.
pub const fn post_confirm_status(kind: PaymentMethodKind) -> OrderStatus {
    match kind {
        PaymentMethodKind::Gateway => OrderStatus::PendingPayment,
        PaymentMethodKind::CashOnDelivery => OrderStatus::PendingPayment,
        PaymentMethodKind::Offline => OrderStatus::PendingPayment,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
