//! Order state machine.
//!
//! Turns a requested status or payment outcome into a validated change record
//! for the store to apply. Nothing here touches storage.

use chrono::{DateTime, Utc};

use souk_core::{OrderStatus, PaymentStatus};

use super::error::CheckoutError;
use super::store::{PaymentChange, StatusChange};
use crate::models::{Coupon, Order};

/// Validate a fulfillment status change.
///
/// `coupon` is the coupon the order redeemed, if any; it decides whether a
/// cancellation releases the redemption (single-use coupons only).
///
/// # Errors
///
/// Returns `IllegalTransition` if `order.status -> to` is not in the
/// adjacency table (which covers every exit from a terminal status), or
/// `PaymentFailed` when shipping an order whose payment failed.
pub fn plan_status_change(
    order: &Order,
    to: OrderStatus,
    coupon: Option<&Coupon>,
    notes: Option<String>,
    at: DateTime<Utc>,
) -> Result<StatusChange, CheckoutError> {
    if !order.status.can_transition_to(to) {
        return Err(CheckoutError::IllegalTransition {
            from: order.status,
            to,
        });
    }

    if to == OrderStatus::Shipped && order.payment_status == PaymentStatus::Failed {
        return Err(CheckoutError::PaymentFailed);
    }

    let cancelling = to == OrderStatus::Cancelled;
    let release_coupon = coupon
        .filter(|c| cancelling && c.is_single_use() && Some(c.id) == order.coupon_id)
        .map(|c| c.id);

    Ok(StatusChange {
        order_id: order.id,
        from: order.status,
        to,
        restock: if cancelling {
            order.restock_lines()
        } else {
            Vec::new()
        },
        release_coupon,
        notes: notes.filter(|n| !n.trim().is_empty()),
        at,
    })
}

/// Result of validating a payment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    /// The order already has this payment status. Repeated callbacks land here.
    Unchanged,
    Change(PaymentChange),
}

/// Validate a payment status change reported by the gateway.
///
/// # Errors
///
/// Returns `IllegalPaymentTransition` if the transition is not in the
/// adjacency table or the order is in a terminal status.
pub fn plan_payment_change(
    order: &Order,
    outcome: PaymentStatus,
    at: DateTime<Utc>,
) -> Result<PaymentDecision, CheckoutError> {
    if order.payment_status == outcome {
        return Ok(PaymentDecision::Unchanged);
    }

    if order.status.is_terminal() || !order.payment_status.can_transition_to(outcome) {
        return Err(CheckoutError::IllegalPaymentTransition {
            from: order.payment_status,
            to: outcome,
        });
    }

    Ok(PaymentDecision::Change(PaymentChange {
        order_id: order.id,
        from: order.payment_status,
        to: outcome,
        at,
    }))
}
