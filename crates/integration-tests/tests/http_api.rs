//! HTTP surface driven in-process over the in-memory store.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use souk_core::CurrencyCode;
use souk_integration_tests::TestShop;
use souk_storefront::config::{CheckoutConfig, PaymentConfig, StorefrontConfig};
use souk_storefront::routes;
use souk_storefront::services::{CallbackVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use souk_storefront::state::AppState;

const ADMIN_TOKEN: &str = "adm_7c1f0e9b4a2d48c6b35e";
const CALLBACK_SECRET: &str = "whsec_5f2a8c1e9d7b4036a1f8";

fn config(callback_secret: Option<&str>) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/souk_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: Url::parse("http://localhost:3000/").unwrap(),
        session_secret: SecretString::from("sess_0b8e4f2a9c7d1e3f5a6b"),
        admin_token: SecretString::from(ADMIN_TOKEN),
        checkout: CheckoutConfig {
            default_currency: CurrencyCode::MAD,
            commit_timeout: Duration::from_secs(5),
            guest_email_domain: "guest.invalid".to_owned(),
        },
        payments: PaymentConfig {
            gateway_url: None,
            gateway_api_key: None,
            callback_secret: callback_secret.map(SecretString::from),
        },
        notify_webhook_url: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

struct Harness {
    app: Router,
    cod: i64,
    oil: i64,
}

fn harness(callback_secret: Option<&str>) -> Harness {
    let shop = TestShop::new().with_free_shipping_over(500);
    shop.add_city("Casablanca", 30);
    let cod = shop.add_cash_on_delivery().as_i64();
    let oil = shop.add_product("ARG-100", Decimal::from(120), 10).as_i64();
    shop.add_welcome20(None);

    let state = AppState::from_parts(config(callback_secret), None, shop.service.clone());
    Harness {
        app: routes::unlimited_routes().with_state(state),
        cod,
        oil,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_post(uri: &str, body: &Value, token: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

async fn place_order(h: &Harness) -> Value {
    let (status, body) = send(
        &h.app,
        post_json(
            "/checkout/orders",
            &json!({
                "items": [{ "product_id": h.oil, "quantity": 2 }],
                "address": {
                    "name": "Amina Benali",
                    "phone": "0600112233",
                    "email": "amina@example.ma",
                    "address": "12 Rue Ibn Batouta",
                    "city": "Casablanca"
                },
                "coupon_code": "welcome20",
                "payment_method_id": h.cod,
                "notes": "Ring twice"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_health_without_database() {
    let h = harness(None);
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_quote_and_place_order() {
    let h = harness(None);

    let (status, quote) = send(
        &h.app,
        post_json(
            "/checkout/quote",
            &json!({
                "items": [{ "product_id": h.oil, "quantity": 2 }],
                "destination": { "city": "casablanca" },
                "coupon_code": "WELCOME20"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(decimal(&quote["subtotal"]), Decimal::from(240));
    assert_eq!(decimal(&quote["discount"]), Decimal::from(48));
    assert_eq!(decimal(&quote["amount_before_fee"]), Decimal::from(222));
    assert_eq!(quote["payment_methods"][0]["code"], "cod");

    let receipt = place_order(&h).await;
    // 240 + 30 - 48 + 10
    assert_eq!(decimal(&receipt["total"]), Decimal::from(232));
    assert_eq!(receipt["status"], "pending");
    assert_eq!(receipt["payment_status"], "pending");
}

#[tokio::test]
async fn test_checkout_errors_carry_reason_codes() {
    let h = harness(None);

    let (status, body) = send(
        &h.app,
        post_json(
            "/checkout/orders",
            &json!({
                "items": [],
                "address": { "name": "A", "phone": "1", "address": "x", "city": "Casablanca" },
                "payment_method_id": h.cod
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "empty_cart");
    assert_eq!(body["retryable"], false);

    let (status, body) = send(
        &h.app,
        post_json(
            "/checkout/coupon",
            &json!({ "code": "WELCOME20", "subtotal": "150" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "coupon_minimum_not_met");

    let (status, body) = send(
        &h.app,
        Request::get("/checkout/payment-methods?amount=-5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_tracking_hides_internal_fields() {
    let h = harness(None);
    let receipt = place_order(&h).await;
    let code = receipt["order_code"].as_str().unwrap();

    let (status, tracked) = send(
        &h.app,
        Request::get(format!("/orders/{code}?email=amina@example.ma"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracked["code"], code);
    assert_eq!(tracked["status"], "pending");
    assert_eq!(tracked["items"][0]["sku"], "ARG-100");
    assert!(tracked.get("notes").is_none());
    assert!(tracked.get("customer_id").is_none());

    let (status, body) = send(
        &h.app,
        Request::get(format!("/orders/{code}?email=other@example.ma"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "order_not_found");
}

#[tokio::test]
async fn test_admin_status_changes_need_token() {
    let h = harness(None);
    let receipt = place_order(&h).await;
    let id = receipt["order_id"].as_i64().unwrap();
    let uri = format!("/admin/orders/{id}/status");

    let (status, body) = send(
        &h.app,
        post_json(&uri, &json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(
        &h.app,
        admin_post(&uri, &json!({ "status": "confirmed" }), "wrong-token"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &h.app,
        admin_post(&uri, &json!({ "status": "delivered" }), ADMIN_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "illegal_transition");

    let (status, body) = send(
        &h.app,
        admin_post(
            &uri,
            &json!({ "status": "confirmed", "notes": "Called the buyer" }),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["notes"], "Ring twice\nCalled the buyer");

    let (status, body) = send(
        &h.app,
        admin_post(
            &format!("/admin/orders/{id}/notes"),
            &json!({ "notes": "Packed" }),
            ADMIN_TOKEN,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notes"], "Ring twice\nCalled the buyer\nPacked");
}

fn signed_callback(body: &Value, secret: &str, timestamp: i64) -> Request<Body> {
    let raw = body.to_string();
    let signature = CallbackVerifier::new(SecretString::from(secret))
        .sign(timestamp, raw.as_bytes())
        .unwrap();
    Request::post("/payments/callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(raw))
        .unwrap()
}

#[tokio::test]
async fn test_payment_callback_signed_and_idempotent() {
    let h = harness(Some(CALLBACK_SECRET));
    let receipt = place_order(&h).await;
    let payload = json!({ "order_id": receipt["order_id"], "outcome": "paid" });
    let now = chrono::Utc::now().timestamp();

    // Unsigned
    let (status, body) = send(&h.app, post_json("/payments/callback", &payload)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_signature");

    // Signed with the wrong secret
    let (status, _) = send(
        &h.app,
        signed_callback(&payload, "whsec_not_the_right_one", now),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Replayed from an hour ago
    let (status, _) = send(
        &h.app,
        signed_callback(&payload, CALLBACK_SECRET, now - 3600),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        let (status, body) = send(&h.app, signed_callback(&payload, CALLBACK_SECRET, now)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["payment_status"], "paid");
        assert_eq!(body["order_code"], receipt["order_code"]);
    }

    let fail_after_paid = json!({ "order_id": receipt["order_id"], "outcome": "failed" });
    let (status, body) = send(
        &h.app,
        signed_callback(&fail_after_paid, CALLBACK_SECRET, now),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "illegal_payment_transition");
}

#[tokio::test]
async fn test_callbacks_refused_without_secret() {
    let h = harness(None);
    let receipt = place_order(&h).await;
    let payload = json!({ "order_id": receipt["order_id"], "outcome": "paid" });

    let (status, _) = send(
        &h.app,
        signed_callback(&payload, CALLBACK_SECRET, chrono::Utc::now().timestamp()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
