//! Races on limited stock, coupon allowances and guest accounts.
//!
//! In the stock and coupon races buyers are registered customers, so the only
//! shared resources are the product rows and the coupon.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;

use souk_core::OrderStatus;
use souk_integration_tests::{TestShop, line, order_request};
use souk_storefront::checkout::{CheckoutError, CreateOrderRequest, OrderReceipt};

async fn race(
    shop: &TestShop,
    buyers: usize,
    build: impl Fn(usize) -> CreateOrderRequest,
) -> (Vec<OrderReceipt>, Vec<CheckoutError>) {
    let mut handles = Vec::with_capacity(buyers);
    for i in 0..buyers {
        let customer = shop.register(&format!("buyer{i}@example.ma")).await;
        let service = shop.service.clone();
        let request = build(i);
        handles.push(tokio::spawn(async move {
            service.create_order(request, Some(customer)).await
        }));
    }

    let mut placed = Vec::new();
    let mut rejected = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => placed.push(receipt),
            Err(e) => rejected.push(e),
        }
    }
    (placed, rejected)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coupon_limit_holds_under_contention() {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let teapot = shop.add_product("TEA-POT", Decimal::from(250), 100);
    let code = shop.add_welcome20(Some(3));

    let (placed, rejected) = race(&shop, 12, |_| {
        let mut request = order_request(vec![line(teapot, 1)], cod, None);
        request.coupon_code = Some("WELCOME20".to_owned());
        request
    })
    .await;

    assert_eq!(placed.len(), 3);
    assert_eq!(rejected.len(), 9);
    for err in &rejected {
        assert!(
            matches!(err, CheckoutError::CouponExhausted { .. }),
            "unexpected error: {err}"
        );
    }

    assert_eq!(shop.store.coupon_used_count(&code), Some(3));
    // Losers reserved nothing
    assert_eq!(shop.store.product_quantity(teapot), Some(97));
    assert_eq!(shop.store.order_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stock_is_never_oversold() {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let lantern = shop.add_product("LAN-BRASS", Decimal::from(340), 5);

    let (placed, rejected) = race(&shop, 20, |_| {
        order_request(vec![line(lantern, 1)], cod, None)
    })
    .await;

    assert_eq!(placed.len(), 5);
    assert_eq!(rejected.len(), 15);
    assert!(rejected.iter().all(|e| matches!(
        e,
        CheckoutError::StockUnavailable { requested: 1, .. }
    )));
    assert!(rejected.iter().all(CheckoutError::is_retryable));
    assert_eq!(shop.store.product_quantity(lantern), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_line_orders_reserve_all_or_nothing() {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let plentiful = shop.add_product("RAS-100", Decimal::from(45), 100);
    let scarce = shop.add_product("RUG-BENI", Decimal::from(2400), 2);

    // Alternate line order so writers would deadlock without sorted locking
    let (placed, _) = race(&shop, 10, |i| {
        let items = if i % 2 == 0 {
            vec![line(plentiful, 3), line(scarce, 1)]
        } else {
            vec![line(scarce, 1), line(plentiful, 3)]
        };
        order_request(items, cod, None)
    })
    .await;

    assert_eq!(placed.len(), 2);
    assert_eq!(shop.store.product_quantity(scarce), Some(0));
    assert_eq!(shop.store.product_quantity(plentiful), Some(94));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_cancellations_restock_once() {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);

    let receipt = shop
        .service
        .create_order(
            order_request(vec![line(oil, 4)], cod, Some("amina@example.ma")),
            None,
        )
        .await
        .unwrap();
    assert_eq!(shop.store.product_quantity(oil), Some(6));

    let service = Arc::new(shop.service.clone());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let id = receipt.order_id;
            tokio::spawn(async move {
                service
                    .update_order_status(id, OrderStatus::Cancelled, None)
                    .await
            })
        })
        .collect();

    let mut cancelled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => {
                assert_eq!(order.status, OrderStatus::Cancelled);
                cancelled += 1;
            }
            Err(e) => assert!(
                matches!(
                    e,
                    CheckoutError::ConcurrentUpdate | CheckoutError::IllegalTransition { .. }
                ),
                "unexpected error: {e}"
            ),
        }
    }

    assert_eq!(cancelled, 1);
    assert_eq!(shop.store.product_quantity(oil), Some(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_guest_checkouts_share_one_account() {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 100);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = shop.service.clone();
            let request = order_request(vec![line(oil, 1)], cod, Some("same@example.ma"));
            tokio::spawn(async move { service.create_order(request, None).await })
        })
        .collect();

    let mut owners = Vec::new();
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        owners.push(receipt.customer_id);
    }

    assert_eq!(owners.len(), 16);
    assert!(owners.iter().all(|id| *id == owners[0]));
    assert_eq!(shop.store.customer_count(), 1);
    assert_eq!(shop.store.order_count(), 16);
    assert_eq!(shop.store.product_quantity(oil), Some(84));
}
