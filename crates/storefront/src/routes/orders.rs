//! Order tracking for customers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{CurrencyCode, OrderStatus, PaymentStatus};

use crate::error::Result;
use crate::models::Order;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub email: String,
}

/// What a customer sees of an order. Notes and ids stay internal.
#[derive(Debug, Serialize)]
pub struct TrackedOrder {
    pub code: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub payment_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub items: Vec<TrackedItem>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TrackedItem {
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

impl From<Order> for TrackedOrder {
    fn from(order: Order) -> Self {
        Self {
            code: order.code,
            status: order.status,
            payment_status: order.payment_status,
            currency: order.totals.currency,
            subtotal: order.totals.subtotal,
            shipping: order.totals.shipping,
            discount: order.totals.discount,
            payment_fee: order.totals.payment_fee,
            tax: order.totals.tax,
            total: order.totals.total,
            items: order
                .items
                .into_iter()
                .map(|item| TrackedItem {
                    name: item.name,
                    sku: item.sku,
                    price: item.price,
                    quantity: item.quantity,
                    total: item.total,
                })
                .collect(),
            payment_method: order.payment_method_code,
            created_at: order.created_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
        }
    }
}

/// Track an order by code.
///
/// GET /orders/{code}?email=
///
/// # Errors
///
/// Returns `order_not_found` when the code is unknown or the email does not
/// match.
pub async fn track(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackedOrder>> {
    let order = state
        .checkout()
        .find_order_by_code(&code, &query.email)
        .await?;
    Ok(Json(order.into()))
}
