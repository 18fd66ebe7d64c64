//! Reservation engine properties: exact-once deduction and restoration,
//! shortage reporting, aggregate-stock invariants.

mod common;

use boutique_core::{CoreError, OrderStatus};
use boutique_engine::EngineError;
use common::*;

#[tokio::test]
async fn shortage_reports_requested_and_available() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 2)]).await;
    let order = ready_order(&ts, "u1", &[line_for_variant(&product, &variants[0], 3)]).await;

    let err = ts.service.confirm("u1", &order.id, None).await.unwrap_err();
    let shortages = err.shortages().expect("insufficient stock error");
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].sku, "DRESS-LINEN-M");
    assert_eq!(shortages[0].requested, 3);
    assert_eq!(shortages[0].available, 2);

    // nothing mutated
    let order = ts.service.order("u1", &order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert!(!order.inventory_deducted);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 2);
}

#[tokio::test]
async fn all_short_lines_are_collected() {
    let ts = store().await;
    let (dress, dress_vars) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 1)]).await;
    let (shoe, shoe_vars) = product_with_sizes(&ts.db, "SHOE-DERBY", 45900, &[("42", 0)]).await;
    let (shirt, shirt_vars) = product_with_sizes(&ts.db, "SHIRT-OXFORD", 18900, &[("L", 9)]).await;

    let order = ready_order(
        &ts,
        "u1",
        &[
            line_for_variant(&dress, &dress_vars[0], 2),
            line_for_variant(&shoe, &shoe_vars[0], 1),
            line_for_variant(&shirt, &shirt_vars[0], 1),
        ],
    )
    .await;

    let err = ts.service.confirm("u1", &order.id, None).await.unwrap_err();
    let shortages = err.shortages().expect("insufficient stock error");
    // both short lines listed, the satisfiable one is not
    assert_eq!(shortages.len(), 2);
    assert!(shortages.iter().any(|s| s.sku == "DRESS-LINEN-M" && s.available == 1));
    assert!(shortages.iter().any(|s| s.sku == "SHOE-DERBY-42" && s.available == 0));

    // the satisfiable line was not deducted either
    assert_eq!(ts.db.products().variant_stock(&shirt_vars[0].id).await.unwrap(), 9);
}

#[tokio::test]
async fn confirm_success_scenario_five_minus_three() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ready_order(&ts, "u1", &[line_for_variant(&product, &variants[0], 3)]).await;

    let order = ts.service.confirm("u1", &order.id, None).await.unwrap();
    assert!(order.inventory_deducted);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 2);
}

#[tokio::test]
async fn cancel_restores_exactly_once() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ready_order(&ts, "u1", &[line_for_variant(&product, &variants[0], 3)]).await;

    ts.service.confirm("u1", &order.id, None).await.unwrap();
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 2);

    let order = ts.service.cancel("u1", &order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    assert!(order.inventory_restored);
    assert!(order.canceled_at.is_some());
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 5);
    assert_eq!(ts.db.products().product_stock(&product.id).await.unwrap(), 5);

    // terminal: a second cancel is rejected and must not double-restore
    let err = ts.service.cancel("u1", &order.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidTransition { .. })
    ));
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 5);
}

#[tokio::test]
async fn deduct_then_restore_is_a_stock_noop() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(
        &ts.db,
        "SHOE-DERBY",
        45900,
        &[("41", 4), ("42", 7), ("43", 1)],
    )
    .await;

    let before_product = ts.db.products().product_stock(&product.id).await.unwrap();
    let mut before_variants = Vec::new();
    for v in &variants {
        before_variants.push(ts.db.products().variant_stock(&v.id).await.unwrap());
    }

    let order = ready_order(
        &ts,
        "u1",
        &[
            line_for_variant(&product, &variants[0], 2),
            line_for_variant(&product, &variants[1], 5),
        ],
    )
    .await;
    ts.service.confirm("u1", &order.id, None).await.unwrap();
    ts.service.cancel("u1", &order.id).await.unwrap();

    assert_eq!(ts.db.products().product_stock(&product.id).await.unwrap(), before_product);
    for (v, before) in variants.iter().zip(before_variants) {
        assert_eq!(ts.db.products().variant_stock(&v.id).await.unwrap(), before);
    }
}

#[tokio::test]
async fn product_stock_equals_variant_sum_after_every_step() {
    let ts = store().await;
    let (product, variants) =
        product_with_sizes(&ts.db, "SHIRT-OXFORD", 18900, &[("S", 3), ("M", 6), ("L", 2)]).await;

    async fn assert_invariant(ts: &TestStore, product_id: &str, variants: &[boutique_core::ProductVariant]) {
        let mut sum = 0;
        for v in variants {
            sum += ts.db.products().variant_stock(&v.id).await.unwrap();
        }
        assert_eq!(ts.db.products().product_stock(product_id).await.unwrap(), sum);
    }

    let order = ready_order(
        &ts,
        "u1",
        &[
            line_for_variant(&product, &variants[1], 4),
            line_for_variant(&product, &variants[2], 1),
        ],
    )
    .await;
    assert_invariant(&ts, &product.id, &variants).await;

    ts.service.confirm("u1", &order.id, None).await.unwrap();
    assert_invariant(&ts, &product.id, &variants).await;

    ts.service.cancel("u1", &order.id).await.unwrap();
    assert_invariant(&ts, &product.id, &variants).await;
}

#[tokio::test]
async fn cancel_of_never_confirmed_draft_skips_restoration() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ts
        .service
        .start("u1", &[line_for_variant(&product, &variants[0], 2)])
        .await
        .unwrap();

    let order = ts.service.cancel("u1", &order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    // never deducted, so the restoration flag short-circuits
    assert!(!order.inventory_deducted);
    assert!(!order.inventory_restored);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 5);
}

#[tokio::test]
async fn variantless_product_deducts_and_restores_directly() {
    let ts = store().await;
    let product = plain_product(&ts.db, "SCARF-01", 9900, 4).await;
    let order = ready_order(&ts, "u1", &[line_plain(&product, 3)]).await;

    ts.service.confirm("u1", &order.id, None).await.unwrap();
    assert_eq!(ts.db.products().product_stock(&product.id).await.unwrap(), 1);

    ts.service.cancel("u1", &order.id).await.unwrap();
    assert_eq!(ts.db.products().product_stock(&product.id).await.unwrap(), 4);
}

#[tokio::test]
async fn variantless_line_fails_once_product_grows_variants() {
    let ts = store().await;
    let product = plain_product(&ts.db, "SCARF-01", 9900, 4).await;
    let order = ready_order(&ts, "u1", &[line_plain(&product, 1)]).await;

    // variants appear between draft and confirm: no unambiguous bucket
    let now = chrono::Utc::now();
    ts.db
        .products()
        .insert_variant(&boutique_core::ProductVariant {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size: "U".into(),
            stock: 4,
            sku: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let err = ts.service.confirm("u1", &order.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::VariantRequired { .. })
    ));

    let order = ts.service.order("u1", &order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert!(!order.inventory_deducted);
}

#[tokio::test]
async fn admin_promotion_deducts_once_with_availability_check() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ts
        .service
        .start("u1", &[line_for_variant(&product, &variants[0], 2)])
        .await
        .unwrap();

    // direct administrative promotion without confirm deducts here
    let order = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::AwaitingDispatch, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingDispatch);
    assert!(order.inventory_deducted);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 3);

    // a later PAID transition must not deduct again
    let order = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::Paid, None)
        .await
        .unwrap();
    assert!(order.paid_at.is_some());
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 3);
}

#[tokio::test]
async fn admin_promotion_fails_on_short_stock() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 1)]).await;
    let order = ts
        .service
        .start("u1", &[line_for_variant(&product, &variants[0], 2)])
        .await
        .unwrap();

    let err = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::AwaitingDispatch, None)
        .await
        .unwrap_err();
    assert!(err.shortages().is_some());

    let order = ts.service.admin_order(&order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 1);
}

#[tokio::test]
async fn refund_restores_stock() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ready_order(&ts, "u1", &[line_for_variant(&product, &variants[0], 3)]).await;

    ts.service.confirm("u1", &order.id, None).await.unwrap();
    ts.service
        .transition(Some("admin"), &order.id, OrderStatus::Paid, None)
        .await
        .unwrap();

    let order = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::Refunded, Some("customer return"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert!(order.inventory_restored);
    assert_eq!(ts.db.products().variant_stock(&variants[0].id).await.unwrap(), 5);

    // terminal now
    let err = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::Paid, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn self_transition_is_a_noop() {
    let ts = store().await;
    let product = plain_product(&ts.db, "SHIRT-01", 10000, 10).await;
    let order = ready_order(&ts, "u1", &[line_plain(&product, 1)]).await;
    ts.service.confirm("u1", &order.id, None).await.unwrap();

    let history_before = ts.service.history(&order.id).await.unwrap().len();

    // pending_payment is not even an admin target, but new == old succeeds
    let order = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::PendingPayment, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);

    let history_after = ts.service.history(&order.id).await.unwrap().len();
    assert_eq!(history_before, history_after);
}

#[tokio::test]
async fn unknown_admin_target_is_rejected() {
    let ts = store().await;
    let product = plain_product(&ts.db, "SHIRT-01", 10000, 10).await;
    let order = ready_order(&ts, "u1", &[line_plain(&product, 1)]).await;
    ts.service.confirm("u1", &order.id, None).await.unwrap();

    let err = ts
        .service
        .transition(Some("admin"), &order.id, OrderStatus::Shipped, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn totals_identity_holds_through_lifecycle() {
    let ts = store().await;
    let (product, variants) = product_with_sizes(&ts.db, "DRESS-LINEN", 28900, &[("M", 5)]).await;
    let order = ready_order(&ts, "u1", &[line_for_variant(&product, &variants[0], 2)]).await;

    fn assert_identity(order: &boutique_core::Order) {
        assert_eq!(
            order.grand_total_cents,
            order.subtotal_cents
                + order.shipping_cost_cents
                + order.payment_fee_cents
                + order.tax_total_cents
        );
    }

    assert_identity(&order);
    let order = ts.service.confirm("u1", &order.id, None).await.unwrap();
    assert_identity(&order);
    let order = ts.service.cancel("u1", &order.id).await.unwrap();
    assert_identity(&order);
}
