//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness
//! GET  /health/ready               - Database readiness
//!
//! # Checkout (rate limited)
//! POST /checkout/quote             - Price preview, no side effects
//! GET  /checkout/payment-methods   - Eligible methods with their fees
//! POST /checkout/coupon            - Validate a coupon against a subtotal
//! POST /checkout/orders            - Place an order
//!
//! # Tracking
//! GET  /orders/{code}?email=       - Order status (email must match)
//!
//! # Back office (bearer token)
//! POST /admin/orders/{id}/status   - Move an order through its lifecycle
//! POST /admin/orders/{id}/notes    - Append notes, allowed in every status
//!
//! # Payment gateway
//! POST /payments/callback          - Signed payment outcome
//! ```

pub mod admin;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, order_rate_limiter};
use crate::state::AppState;

/// Create the checkout routes router.
///
/// Order placement gets its own, stricter limiter.
pub fn checkout_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/orders", post(checkout::create_order))
        .layer(order_rate_limiter());

    Router::new()
        .route("/quote", post(checkout::quote))
        .route("/payment-methods", get(checkout::payment_methods))
        .route("/coupon", post(checkout::check_coupon))
        .layer(api_rate_limiter())
        .merge(orders)
}

/// Create the back-office routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/status", post(admin::update_status))
        .route("/orders/{id}/notes", post(admin::add_notes))
}

/// Create all routes for the storefront.
///
/// Rate limiting keys on the client IP from proxy headers, then on the peer
/// address, so the router must be served with connect info.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/checkout", checkout_routes())
        .route("/orders/{code}", get(orders::track))
        .nest("/admin", admin_routes())
        .route("/payments/callback", post(payments::callback))
}

/// Routes without rate limiting, for driving handlers in tests where
/// requests carry no client IP.
pub fn unlimited_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .route("/checkout/quote", post(checkout::quote))
        .route("/checkout/payment-methods", get(checkout::payment_methods))
        .route("/checkout/coupon", post(checkout::check_coupon))
        .route("/checkout/orders", post(checkout::create_order))
        .route("/orders/{code}", get(orders::track))
        .nest("/admin", admin_routes())
        .route("/payments/callback", post(payments::callback))
}
