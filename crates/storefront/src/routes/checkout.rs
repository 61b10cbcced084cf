//! Checkout JSON API.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use souk_core::CurrencyCode;

use crate::checkout::{
    AppliedCoupon, CreateOrderRequest, MethodOffer, OrderReceipt, Quote, QuoteRequest,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalCustomer;
use crate::state::AppState;

/// Price a cart without reserving anything.
///
/// POST /checkout/quote
///
/// # Errors
///
/// Returns cart validation errors.
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>> {
    Ok(Json(state.checkout().quote(&request).await?))
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodsQuery {
    /// Order amount before the payment fee.
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Payment methods offered for an amount, with the fee each would add.
///
/// GET /checkout/payment-methods?amount=&currency=
///
/// # Errors
///
/// Returns `AppError::BadRequest` for negative amounts.
pub async fn payment_methods(
    State(state): State<AppState>,
    Query(query): Query<PaymentMethodsQuery>,
) -> Result<Json<Vec<MethodOffer>>> {
    if query.amount < Decimal::ZERO {
        return Err(AppError::BadRequest("amount must not be negative".to_string()));
    }
    let offers = state
        .checkout()
        .payment_methods(query.amount, query.currency)
        .await?;
    Ok(Json(offers))
}

#[derive(Debug, Deserialize)]
pub struct CouponCheckRequest {
    pub code: String,
    pub subtotal: Decimal,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Validate a coupon code against a subtotal. Nothing is redeemed.
///
/// POST /checkout/coupon
///
/// # Errors
///
/// Returns the coupon's rejection reason (`coupon_expired`,
/// `coupon_exhausted`, ...).
pub async fn check_coupon(
    State(state): State<AppState>,
    Json(request): Json<CouponCheckRequest>,
) -> Result<Json<AppliedCoupon>> {
    let applied = state
        .checkout()
        .check_coupon(&request.code, request.subtotal, request.currency)
        .await?;
    Ok(Json(applied))
}

/// Place an order.
///
/// POST /checkout/orders
///
/// Buyers who are not signed in get a guest account, which the session
/// adopts so their next order lands on the same account.
///
/// # Errors
///
/// Returns validation errors, `stock_unavailable`, `coupon_exhausted` and
/// the other contention errors.
pub async fn create_order(
    State(state): State<AppState>,
    customer: OptionalCustomer,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderReceipt>)> {
    let receipt = state
        .checkout()
        .create_order(request, customer.current().cloned())
        .await?;

    if let Some(guest) = &receipt.session_customer
        && let Err(e) = customer.remember(guest).await
    {
        // Order is already committed
        tracing::warn!(
            error = %e,
            order_code = %receipt.order_code,
            "Could not store guest in session"
        );
    }

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_code", receipt.order_code.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}
