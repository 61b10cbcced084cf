//! Guest provisioning during checkout.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use souk_core::Email;
use souk_integration_tests::{TestShop, line, order_request};
use souk_storefront::checkout::{CheckoutError, CheckoutStore};
use souk_storefront::services::Notification;

fn shop() -> TestShop {
    let shop = TestShop::new();
    shop.add_city("Casablanca", 30);
    shop
}

#[tokio::test]
async fn test_guest_account_created_and_adopted() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);

    let receipt = shop
        .service
        .create_order(
            order_request(vec![line(oil, 1)], cod, Some("Amina@Example.ma")),
            None,
        )
        .await
        .unwrap();

    let adopted = receipt.session_customer.unwrap();
    assert_eq!(adopted.id, receipt.customer_id);
    assert_eq!(adopted.email.as_str(), "amina@example.ma");

    let customer = shop.store.customer(adopted.id).await.unwrap().unwrap();
    assert!(customer.is_guest);
    assert!(customer.credential_delivered);

    let sent = shop.notifier.wait_for("guest_account_created", 1).await;
    match &sent[0] {
        Notification::GuestAccountCreated { email, .. } => assert_eq!(email, &adopted.email),
        other => panic!("unexpected notification {other:?}"),
    }
}

#[tokio::test]
async fn test_resubmitting_after_commit_failure_reuses_account() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let rug = shop.add_product("RUG-BENI", Decimal::from(2400), 1);
    let email = Email::parse("karim@example.ma").unwrap();

    for _ in 0..2 {
        let err = shop
            .service
            .create_order(
                order_request(vec![line(rug, 2)], cod, Some(email.as_str())),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::StockUnavailable { .. }));
    }
    assert_eq!(shop.store.customer_count(), 1);
    assert_eq!(shop.store.order_count(), 0);
    let provisional_hash = shop.store.password_hash(&email).unwrap();

    let receipt = shop
        .service
        .create_order(
            order_request(vec![line(rug, 1)], cod, Some(email.as_str())),
            None,
        )
        .await
        .unwrap();
    assert_eq!(shop.store.customer_count(), 1);

    // The first credential was never sent, so a new one is issued
    assert_ne!(shop.store.password_hash(&email).unwrap(), provisional_hash);
    let customer = shop
        .store
        .customer(receipt.customer_id)
        .await
        .unwrap()
        .unwrap();
    assert!(customer.credential_delivered);
    shop.notifier.wait_for("guest_account_created", 1).await;
}

#[tokio::test]
async fn test_returning_guest_gets_no_second_credential() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);

    let first = shop
        .service
        .create_order(
            order_request(vec![line(oil, 1)], cod, Some("salma@example.ma")),
            None,
        )
        .await
        .unwrap();
    let second = shop
        .service
        .create_order(
            order_request(vec![line(oil, 1)], cod, Some("salma@example.ma")),
            None,
        )
        .await
        .unwrap();

    assert_eq!(first.customer_id, second.customer_id);
    assert_eq!(shop.store.customer_count(), 1);

    shop.notifier.wait_for("order_placed", 2).await;
    let credentials = shop
        .notifier
        .kinds()
        .into_iter()
        .filter(|k| *k == "guest_account_created")
        .count();
    assert_eq!(credentials, 1);
}

#[tokio::test]
async fn test_registered_email_requires_sign_in() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);
    shop.register("nadia@example.ma").await;

    let err = shop
        .service
        .create_order(
            order_request(vec![line(oil, 1)], cod, Some("NADIA@example.ma")),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::AccountExists(_)));
    assert_eq!(err.reason_code(), "account_exists");
    assert_eq!(shop.store.order_count(), 0);
    assert_eq!(shop.store.product_quantity(oil), Some(10));
}

#[tokio::test]
async fn test_guest_without_email_keyed_on_phone() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);

    let receipt = shop
        .service
        .create_order(order_request(vec![line(oil, 1)], cod, None), None)
        .await
        .unwrap();

    let adopted = receipt.session_customer.unwrap();
    assert_eq!(adopted.email.as_str(), "guest-212600112233@guest.invalid");

    let order = shop.store.order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.address.email, adopted.email);
}

#[tokio::test]
async fn test_signed_in_customer_owns_order() {
    let shop = shop();
    let cod = shop.add_cash_on_delivery();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10);
    let customer = shop.register("omar@example.ma").await;

    let receipt = shop
        .service
        .create_order(
            order_request(vec![line(oil, 1)], cod, None),
            Some(customer.clone()),
        )
        .await
        .unwrap();

    assert_eq!(receipt.customer_id, customer.id);
    assert!(receipt.session_customer.is_none());
    assert_eq!(shop.store.customer_count(), 1);

    // Without an address email the account email is used
    let order = shop.store.order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.address.email, customer.email);
}
