//! Payment gateway callbacks.
//!
//! The gateway signs `v1:{timestamp}:{body}` with the shared secret and
//! sends the result in `x-souk-signature`, the timestamp in
//! `x-souk-timestamp`. The raw body is verified before it is parsed.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use souk_core::{OrderId, PaymentStatus};

use crate::error::{AppError, Result};
use crate::services::{SIGNATURE_HEADER, SignatureError, TIMESTAMP_HEADER};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub order_id: OrderId,
    pub outcome: PaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct PaymentCallbackResponse {
    pub order_code: String,
    pub payment_status: PaymentStatus,
}

/// Record a payment outcome. Repeating an outcome is acknowledged without
/// changing anything.
///
/// POST /payments/callback
///
/// # Errors
///
/// Returns `invalid_signature` for unsigned, stale or tampered requests,
/// `bad_request` for malformed bodies and the lifecycle errors of
/// `handle_payment_callback`.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentCallbackResponse>> {
    let verifier = state.callbacks().ok_or_else(|| {
        tracing::warn!("Payment callback received but no callback secret is configured");
        AppError::Signature(SignatureError::Key)
    })?;

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let timestamp = header(TIMESTAMP_HEADER).ok_or(SignatureError::InvalidTimestamp)?;
    let signature = header(SIGNATURE_HEADER).ok_or(SignatureError::Mismatch)?;

    if let Err(e) = verifier.verify(timestamp, &body, signature) {
        tracing::warn!(error = %e, "Rejected payment callback");
        return Err(e.into());
    }

    let callback: PaymentCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid callback body: {e}")))?;

    let order = state
        .checkout()
        .handle_payment_callback(callback.order_id, callback.outcome)
        .await?;

    Ok(Json(PaymentCallbackResponse {
        order_code: order.code,
        payment_status: order.payment_status,
    }))
}
