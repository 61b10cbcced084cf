//! Checkout error taxonomy.
//!
//! Every failure carries a stable reason code (sent to clients) and one of a
//! few categories that decide how it is reported:
//!
//! - `Validation`: bad input. Reported synchronously, never retried.
//! - `Contention`: a race was lost. Nothing was committed, retry is safe.
//! - `Downstream`: notification or gateway trouble. Logged, checkout proceeds.
//! - `Invariant`: a logic defect. Logged at error level and sent to Sentry.
//! - `Internal`: storage or infrastructure failure.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use souk_core::{
    CouponCode, CouponCodeError, CurrencyCode, Email, EmailError, OrderStatus, PaymentMethodId,
    PaymentStatus, ProductId,
};

use super::store::StoreError;
use crate::db::RepositoryError;

/// How a checkout error should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Contention,
    Downstream,
    Invariant,
    Internal,
}

/// Errors produced by the checkout engine.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("product {product_id} is priced in {found}, cart is in {expected}")]
    CurrencyMismatch {
        product_id: ProductId,
        expected: CurrencyCode,
        found: CurrencyCode,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("invalid coupon code: {0}")]
    InvalidCouponCode(#[from] CouponCodeError),

    #[error("coupon {0} not found")]
    CouponNotFound(CouponCode),

    #[error("coupon {0} is not valid at this time")]
    CouponExpired(CouponCode),

    /// No redemptions left. `at_commit` is set when the limit was reached by
    /// a concurrent checkout between validation and commit.
    #[error("coupon {code} has no uses left")]
    CouponExhausted { code: CouponCode, at_commit: bool },

    #[error("coupon {code} requires a subtotal of at least {minimum}")]
    CouponMinimumNotMet { code: CouponCode, minimum: Decimal },

    #[error("unknown payment method {0}")]
    UnknownPaymentMethod(PaymentMethodId),

    #[error("payment method {0} is not available for this order")]
    PaymentMethodUnavailable(String),

    #[error("no shipping rate for the destination")]
    ShippingUnresolved,

    #[error("an account already exists for {0}, sign in to continue")]
    AccountExists(Email),

    #[error("order not found")]
    OrderNotFound,

    #[error("not enough stock for product {product_id}")]
    StockUnavailable {
        product_id: ProductId,
        requested: i32,
    },

    #[error("order commit timed out")]
    CommitTimeout,

    #[error("order was modified concurrently")]
    ConcurrentUpdate,

    #[error("could not allocate a unique order code")]
    OrderCodeExhausted,

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("illegal payment transition from {from} to {to}")]
    IllegalPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("cannot ship an order whose payment failed")]
    PaymentFailed,

    #[error("computed total is negative: {0}")]
    NegativeTotal(Decimal),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("failed to hash guest credential")]
    CredentialHash,
}

impl CheckoutError {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyCart
            | Self::InvalidQuantity { .. }
            | Self::UnknownProduct(_)
            | Self::CurrencyMismatch { .. }
            | Self::MissingField(_)
            | Self::InvalidEmail(_)
            | Self::InvalidCouponCode(_)
            | Self::CouponNotFound(_)
            | Self::CouponExpired(_)
            | Self::CouponExhausted {
                at_commit: false, ..
            }
            | Self::CouponMinimumNotMet { .. }
            | Self::UnknownPaymentMethod(_)
            | Self::PaymentMethodUnavailable(_)
            | Self::ShippingUnresolved
            | Self::AccountExists(_)
            | Self::OrderNotFound => ErrorCategory::Validation,
            Self::CouponExhausted {
                at_commit: true, ..
            }
            | Self::StockUnavailable { .. }
            | Self::CommitTimeout
            | Self::ConcurrentUpdate
            | Self::OrderCodeExhausted => ErrorCategory::Contention,
            Self::IllegalTransition { .. }
            | Self::IllegalPaymentTransition { .. }
            | Self::PaymentFailed
            | Self::NegativeTotal(_) => ErrorCategory::Invariant,
            Self::Notification(_) | Self::Gateway(_) => ErrorCategory::Downstream,
            Self::Storage(_) | Self::CredentialHash => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable reason, sent to clients.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::EmptyCart => "empty_cart",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::UnknownProduct(_) => "unknown_product",
            Self::CurrencyMismatch { .. } => "currency_mismatch",
            Self::MissingField(_) => "missing_field",
            Self::InvalidEmail(_) => "invalid_email",
            Self::InvalidCouponCode(_) | Self::CouponNotFound(_) => "coupon_not_found",
            Self::CouponExpired(_) => "coupon_expired",
            Self::CouponExhausted { .. } => "coupon_exhausted",
            Self::CouponMinimumNotMet { .. } => "coupon_minimum_not_met",
            Self::UnknownPaymentMethod(_) => "unknown_payment_method",
            Self::PaymentMethodUnavailable(_) => "payment_method_unavailable",
            Self::ShippingUnresolved => "shipping_unresolved",
            Self::AccountExists(_) => "account_exists",
            Self::OrderNotFound => "order_not_found",
            Self::StockUnavailable { .. } => "stock_unavailable",
            Self::CommitTimeout => "commit_timeout",
            Self::ConcurrentUpdate => "concurrent_update",
            Self::OrderCodeExhausted => "order_code_exhausted",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::IllegalPaymentTransition { .. } => "illegal_payment_transition",
            Self::PaymentFailed => "payment_failed",
            Self::NegativeTotal(_) => "negative_total",
            Self::Notification(_) => "notification_failed",
            Self::Gateway(_) => "gateway_error",
            Self::Storage(_) | Self::CredentialHash => "internal_error",
        }
    }

    /// Whether the same request may succeed if sent again unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Contention)
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                requested,
            } => Self::StockUnavailable {
                product_id,
                requested,
            },
            StoreError::CouponExhausted(code) => Self::CouponExhausted {
                code,
                at_commit: true,
            },
            StoreError::CouponUnavailable(code) => Self::CouponNotFound(code),
            StoreError::CouponExpired(code) => Self::CouponExpired(code),
            StoreError::CommitTimeout => Self::CommitTimeout,
            StoreError::StaleStatus => Self::ConcurrentUpdate,
            StoreError::PaymentFailed => Self::PaymentFailed,
            StoreError::NotFound => Self::OrderNotFound,
            StoreError::DuplicateOrderCode => Self::OrderCodeExhausted,
            StoreError::EmailTaken(email) => Self::AccountExists(email),
            StoreError::Backend(e) => Self::Storage(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn code() -> CouponCode {
        CouponCode::parse("WELCOME20").unwrap()
    }

    #[test]
    fn test_coupon_reasons_are_distinct() {
        let expired = CheckoutError::CouponExpired(code());
        let exhausted = CheckoutError::CouponExhausted {
            code: code(),
            at_commit: false,
        };
        let stock = CheckoutError::StockUnavailable {
            product_id: ProductId::new(1),
            requested: 1,
        };
        assert_eq!(expired.reason_code(), "coupon_expired");
        assert_eq!(exhausted.reason_code(), "coupon_exhausted");
        assert_eq!(stock.reason_code(), "stock_unavailable");
    }

    #[test]
    fn test_race_losses_are_retryable() {
        let lost = CheckoutError::from(StoreError::CouponExhausted(code()));
        assert_eq!(lost.category(), ErrorCategory::Contention);
        assert!(lost.is_retryable());
        assert_eq!(lost.reason_code(), "coupon_exhausted");

        let stock = CheckoutError::from(StoreError::InsufficientStock {
            product_id: ProductId::new(4),
            requested: 1,
        });
        assert!(stock.is_retryable());
        assert!(CheckoutError::CommitTimeout.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = CheckoutError::CouponExhausted {
            code: code(),
            at_commit: false,
        };
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(!err.is_retryable());
        assert!(!CheckoutError::ShippingUnresolved.is_retryable());
    }

    #[test]
    fn test_transitions_are_invariant_violations() {
        let err = CheckoutError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        assert_eq!(err.category(), ErrorCategory::Invariant);
        assert_eq!(err.to_string(), "illegal transition from pending to delivered");
        assert_eq!(CheckoutError::PaymentFailed.category(), ErrorCategory::Invariant);
    }
}
