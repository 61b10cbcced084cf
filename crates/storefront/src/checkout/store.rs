//! Storage seam for the checkout engine.
//!
//! The engine never reads-then-writes a shared counter. Every mutation that
//! races with other checkouts is a single conditional update inside the
//! store: stock is decremented only while enough remains, coupon usage is
//! incremented only while below the limit, status writes only succeed if the
//! status is still the one the caller saw. Shipping additionally requires the
//! payment to not have failed at write time.
//!
//! Two implementations exist: [`crate::db::PgCheckoutStore`] and
//! [`super::memory::MemoryCheckoutStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;

use souk_core::{
    CouponCode, CouponId, CustomerId, Email, OrderId, OrderStatus, PaymentStatus, ProductId,
};

use crate::db::RepositoryError;
use crate::models::{
    CheckoutSettings, Coupon, Customer, NewCustomer, NewOrder, Order, PaymentMethod, Product,
    ShippingRate,
};

/// Failures reported by a [`CheckoutStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock decrement found fewer units than requested.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
    },

    /// A conditional usage increment found the coupon at its limit.
    #[error("coupon {0} is exhausted")]
    CouponExhausted(CouponCode),

    /// The coupon was deactivated or removed before commit.
    #[error("coupon {0} is no longer available")]
    CouponUnavailable(CouponCode),

    /// The coupon's validity window closed before commit.
    #[error("coupon {0} is no longer valid")]
    CouponExpired(CouponCode),

    /// The commit did not finish staging before its deadline and was rolled
    /// back.
    #[error("commit deadline exceeded")]
    CommitTimeout,

    /// Another order already uses the generated code.
    #[error("order code already taken")]
    DuplicateOrderCode,

    /// A customer with the email already exists.
    #[error("customer {0} already exists")]
    EmailTaken(Email),

    /// The row changed since it was read.
    #[error("stale status")]
    StaleStatus,

    /// The order's payment failed, so it cannot ship.
    #[error("payment failed")]
    PaymentFailed,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] RepositoryError),
}

/// A validated fulfillment status change, ready to be applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: OrderId,
    /// Status the caller observed. The write fails if it changed.
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Stock to put back (cancellation only).
    pub restock: Vec<(ProductId, i32)>,
    /// Coupon redemption to release (cancellation of a single-use coupon).
    pub release_coupon: Option<CouponId>,
    /// Notes to append in the same write.
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// A validated payment status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentChange {
    pub order_id: OrderId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub at: DateTime<Utc>,
}

/// Persistence used by the checkout engine.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Current checkout settings snapshot.
    async fn settings(&self) -> Result<CheckoutSettings, StoreError>;

    /// Products with the given ids. Unknown ids are simply absent.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, StoreError>;

    /// Active or not; the validator decides.
    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;

    /// All payment methods, enabled or not.
    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError>;

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, StoreError>;

    /// Uniqueness-enforcing insert. Fails with [`StoreError::EmailTaken`] if
    /// the email exists.
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError>;

    /// Replace a guest's undelivered temporary credential.
    async fn rotate_credential(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    async fn mark_credential_delivered(&self, id: CustomerId) -> Result<(), StoreError>;

    /// Persist an order in one unit of work: reserve stock for every item,
    /// redeem the coupon, insert the order and its items. On any error none
    /// of it survives.
    ///
    /// Work that has not reached the final commit by `deadline` is rolled
    /// back with [`StoreError::CommitTimeout`]. Once the final commit is
    /// issued it runs to completion and its outcome is reported.
    async fn commit_order(&self, order: NewOrder, deadline: Instant) -> Result<Order, StoreError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError>;

    /// Apply a status change if the order is still in `change.from`,
    /// restocking and releasing the coupon in the same unit of work.
    ///
    /// A change to `shipped` fails with [`StoreError::PaymentFailed`] if the
    /// payment status is `failed` at write time.
    async fn apply_status_change(&self, change: &StatusChange) -> Result<Order, StoreError>;

    /// Apply a payment status change if it is still `change.from`.
    async fn apply_payment_change(&self, change: &PaymentChange) -> Result<Order, StoreError>;

    /// Append a line to the order's notes. Allowed in every status.
    async fn append_notes(&self, id: OrderId, notes: &str) -> Result<Order, StoreError>;
}

/// Join existing notes and a new entry, one entry per line.
#[must_use]
pub fn join_notes(existing: Option<&str>, entry: &str) -> String {
    match existing.map(str::trim_end).filter(|n| !n.is_empty()) {
        Some(existing) => format!("{existing}\n{}", entry.trim()),
        None => entry.trim().to_owned(),
    }
}
