//! # Order Totals
//!
//! Pure recomputation of an order's aggregate money fields from its line
//! items and selected fulfillment methods.
//!
//! Invariant: `grand_total == subtotal + shipping_cost + payment_fee +
//! tax_total` and `total_items == Σ quantity`. Recomputation is idempotent
//! and touches nothing beyond the returned struct.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{OrderItem, PaymentMethod, ShippingMethod};

/// The aggregate money fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub payment_fee: Money,
    pub tax_total: Money,
    pub grand_total: Money,
    pub total_items: i64,
}

/// Recomputes totals from line items and the selected methods.
///
/// - `subtotal`: sum of line subtotals.
/// - `shipping_cost`: the method's base cost, zero while unset.
/// - `payment_fee`: percentage of the subtotal plus a fixed part, zero while
///   unset.
/// - `tax_total`: fixed at zero until tax rules land.
pub fn compute_totals(
    items: &[OrderItem],
    shipping: Option<&ShippingMethod>,
    payment: Option<&PaymentMethod>,
) -> OrderTotals {
    let subtotal: Money = items.iter().map(|it| it.line_subtotal()).sum();

    let shipping_cost = shipping.map(|sm| sm.base_cost()).unwrap_or_default();

    let payment_fee = payment
        .map(|pm| subtotal.apply_rate(pm.fee_rate()) + pm.fee_fixed())
        .unwrap_or_default();

    let tax_total = Money::zero();

    OrderTotals {
        subtotal,
        shipping_cost,
        payment_fee,
        tax_total,
        grand_total: subtotal + shipping_cost + payment_fee + tax_total,
        total_items: items.iter().map(|it| it.quantity).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethodKind;

    fn item(unit_cents: i64, qty: i64) -> OrderItem {
        OrderItem {
            id: format!("item-{unit_cents}-{qty}"),
            order_id: "o1".into(),
            product_id: "p1".into(),
            variant_id: None,
            name_snapshot: "Linen Shirt".into(),
            sku_snapshot: "SHIRT-01".into(),
            unit_price_cents: unit_cents,
            quantity: qty,
            line_subtotal_cents: unit_cents * qty,
        }
    }

    fn shipping(base_cost_cents: i64) -> ShippingMethod {
        ShippingMethod {
            id: "sm1".into(),
            code: "standard".into(),
            name: "Standard".into(),
            description: None,
            base_cost_cents,
            transit_days_min: 1,
            transit_days_max: 5,
            is_active: true,
            supports_cod: true,
            requires_pickup: false,
        }
    }

    fn payment(bps: u32, fixed_cents: i64) -> PaymentMethod {
        PaymentMethod {
            id: "pm1".into(),
            code: "card_gateway".into(),
            name: "Card".into(),
            kind: PaymentMethodKind::Gateway,
            instructions: None,
            gateway_provider: Some("stripe".into()),
            is_active: true,
            fee_percent_bps: bps,
            fee_fixed_cents: fixed_cents,
            supports_refund: true,
        }
    }

    #[test]
    fn test_empty_order_is_all_zero() {
        let totals = compute_totals(&[], None, None);
        assert_eq!(totals.subtotal, Money::zero());
        assert_eq!(totals.grand_total, Money::zero());
        assert_eq!(totals.total_items, 0);
    }

    #[test]
    fn test_subtotal_and_item_count() {
        let items = vec![item(2500, 2), item(9900, 1)];
        let totals = compute_totals(&items, None, None);
        assert_eq!(totals.subtotal.cents(), 2500 * 2 + 9900);
        assert_eq!(totals.total_items, 3);
        assert_eq!(totals.grand_total, totals.subtotal);
    }

    #[test]
    fn test_shipping_and_fee() {
        let items = vec![item(10000, 1)];
        // 2.5% of 100.00 = 2.50, plus fixed 1.00
        let totals = compute_totals(&items, Some(&shipping(1500)), Some(&payment(250, 100)));
        assert_eq!(totals.shipping_cost.cents(), 1500);
        assert_eq!(totals.payment_fee.cents(), 350);
        assert_eq!(totals.tax_total, Money::zero());
        assert_eq!(totals.grand_total.cents(), 10000 + 1500 + 350);
    }

    #[test]
    fn test_grand_total_identity() {
        let items = vec![item(1999, 3), item(4550, 2)];
        let totals = compute_totals(&items, Some(&shipping(800)), Some(&payment(175, 50)));
        assert_eq!(
            totals.grand_total,
            totals.subtotal + totals.shipping_cost + totals.payment_fee + totals.tax_total
        );
    }

    #[test]
    fn test_idempotent() {
        let items = vec![item(1999, 3)];
        let sm = shipping(800);
        let pm = payment(175, 50);
        let first = compute_totals(&items, Some(&sm), Some(&pm));
        let second = compute_totals(&items, Some(&sm), Some(&pm));
        assert_eq!(first, second);
    }
}
