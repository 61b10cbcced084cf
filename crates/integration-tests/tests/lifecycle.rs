//! Order and payment status transitions after checkout.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use souk_core::{CouponCode, OrderId, OrderStatus, PaymentStatus, ProductId};
use souk_integration_tests::{TestShop, line, order_request};
use souk_storefront::checkout::{CheckoutError, CheckoutStore, OrderReceipt};
use souk_storefront::models::{DiscountType, NewCoupon};

async fn placed_order(shop: &TestShop, coupon: Option<&str>) -> (OrderReceipt, ProductId) {
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);

    let mut request = order_request(vec![line(oil, 2)], cod, Some("amina@example.ma"));
    request.coupon_code = coupon.map(str::to_owned);
    let receipt = shop.service.create_order(request, None).await.unwrap();
    (receipt, oil)
}

async fn advance(
    shop: &TestShop,
    id: OrderId,
    to: OrderStatus,
) -> Result<OrderStatus, CheckoutError> {
    shop.service
        .update_order_status(id, to, None)
        .await
        .map(|order| order.status)
}

#[tokio::test]
async fn test_pending_cannot_jump_to_delivered() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;

    let err = advance(&shop, receipt.order_id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        }
    ));
}

#[tokio::test]
async fn test_full_fulfillment_path() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;
    let id = receipt.order_id;

    for to in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        assert_eq!(advance(&shop, id, to).await.unwrap(), to);
    }

    let order = shop.store.order(id).await.unwrap().unwrap();
    assert!(order.shipped_at.is_some());
    assert!(order.delivered_at.is_some());
    assert!(order.cancelled_at.is_none());

    // Terminal orders stay put
    let err = advance(&shop, id, OrderStatus::Cancelled).await.unwrap_err();
    assert!(matches!(err, CheckoutError::IllegalTransition { .. }));

    let changes = shop.notifier.wait_for("status_changed", 4).await;
    assert_eq!(changes.len(), 4);
}

#[tokio::test]
async fn test_failed_payment_blocks_shipping() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;
    let id = receipt.order_id;

    advance(&shop, id, OrderStatus::Confirmed).await.unwrap();
    advance(&shop, id, OrderStatus::Processing).await.unwrap();
    shop.service
        .handle_payment_callback(id, PaymentStatus::Failed)
        .await
        .unwrap();

    let err = advance(&shop, id, OrderStatus::Shipped).await.unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentFailed));

    // A later successful payment unblocks it
    shop.service
        .handle_payment_callback(id, PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(
        advance(&shop, id, OrderStatus::Shipped).await.unwrap(),
        OrderStatus::Shipped
    );
}

#[tokio::test]
async fn test_cancellation_restocks_and_releases_single_use_coupon() {
    let shop = TestShop::new();
    let code = CouponCode::parse("FIRST50").unwrap();
    shop.store
        .insert_coupon(NewCoupon {
            code: code.clone(),
            discount_type: DiscountType::Fixed,
            value: Decimal::from(50),
            minimum_amount: Decimal::ZERO,
            maximum_discount: None,
            usage_limit: Some(1),
            starts_at: None,
            expires_at: None,
            currency: None,
        })
        .unwrap();

    let (receipt, oil) = placed_order(&shop, Some("first50")).await;
    assert_eq!(shop.store.product_quantity(oil), Some(8));
    assert_eq!(shop.store.coupon_used_count(&code), Some(1));

    let order = shop
        .service
        .update_order_status(
            receipt.order_id,
            OrderStatus::Cancelled,
            Some("Customer changed their mind".to_owned()),
        )
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancelled_at.is_some());
    assert_eq!(order.notes.as_deref(), Some("Customer changed their mind"));
    assert_eq!(shop.store.product_quantity(oil), Some(10));
    assert_eq!(shop.store.coupon_used_count(&code), Some(0));
}

#[tokio::test]
async fn test_cancellation_keeps_multi_use_coupon_redeemed() {
    let shop = TestShop::new();
    let code = shop.add_welcome20(Some(50));
    let (receipt, _) = placed_order(&shop, Some("WELCOME20")).await;

    advance(&shop, receipt.order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(shop.store.coupon_used_count(&code), Some(1));
}

#[tokio::test]
async fn test_notes_allowed_on_terminal_orders() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;
    let id = receipt.order_id;

    advance(&shop, id, OrderStatus::Cancelled).await.unwrap();
    shop.service.add_order_notes(id, "Refund sent").await.unwrap();
    let order = shop
        .service
        .add_order_notes(id, "Customer confirmed receipt")
        .await
        .unwrap();
    assert_eq!(
        order.notes.as_deref(),
        Some("Refund sent\nCustomer confirmed receipt")
    );

    let err = shop.service.add_order_notes(id, "   ").await.unwrap_err();
    assert!(matches!(err, CheckoutError::MissingField("notes")));

    let err = shop
        .service
        .add_order_notes(OrderId::new(9999), "lost")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound));
}

#[tokio::test]
async fn test_repeated_payment_callback_is_idempotent() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;
    let id = receipt.order_id;

    let first = shop
        .service
        .handle_payment_callback(id, PaymentStatus::Paid)
        .await
        .unwrap();
    let second = shop
        .service
        .handle_payment_callback(id, PaymentStatus::Paid)
        .await
        .unwrap();

    assert_eq!(first.payment_status, PaymentStatus::Paid);
    assert_eq!(first, second);

    shop.notifier.wait_for("payment_updated", 1).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        shop.notifier
            .kinds()
            .iter()
            .filter(|k| **k == "payment_updated")
            .count(),
        1
    );

    // Paid orders can be refunded but not failed
    let err = shop
        .service
        .handle_payment_callback(id, PaymentStatus::Failed)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::IllegalPaymentTransition { .. }));
}

#[tokio::test]
async fn test_tracking_requires_matching_email() {
    let shop = TestShop::new();
    let (receipt, _) = placed_order(&shop, None).await;

    let order = shop
        .service
        .find_order_by_code(&receipt.order_code.to_lowercase(), "AMINA@example.ma")
        .await
        .unwrap();
    assert_eq!(order.id, receipt.order_id);

    let err = shop
        .service
        .find_order_by_code(&receipt.order_code, "someone@example.ma")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound));
}
