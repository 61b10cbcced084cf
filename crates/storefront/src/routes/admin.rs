//! Back-office order management.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use souk_core::{OrderId, OrderStatus, PaymentStatus};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

/// Order state after a back-office change.
#[derive(Debug, Serialize)]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub order_code: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
}

impl From<Order> for OrderStatusView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            order_code: order.code,
            status: order.status,
            payment_status: order.payment_status,
            notes: order.notes,
        }
    }
}

/// Move an order to a new status.
///
/// POST /admin/orders/{id}/status
///
/// # Errors
///
/// Returns `illegal_transition`, `payment_failed`, `concurrent_update` or
/// `order_not_found`.
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<OrderStatusView>> {
    let order = state
        .checkout()
        .update_order_status(OrderId::new(id), request.status, request.notes)
        .await?;
    Ok(Json(order.into()))
}

/// Append notes to an order, whatever its status.
///
/// POST /admin/orders/{id}/notes
///
/// # Errors
///
/// Returns `missing_field` for blank notes or `order_not_found`.
pub async fn add_notes(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<NotesRequest>,
) -> Result<Json<OrderStatusView>> {
    let order = state
        .checkout()
        .add_order_notes(OrderId::new(id), &request.notes)
        .await?;
    Ok(Json(order.into()))
}
