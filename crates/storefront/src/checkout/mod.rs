//! Checkout and pricing engine.
//!
//! # Components
//!
//! - [`shipping`] - Destination to shipping cost, with free-shipping threshold
//! - [`coupon`] - Coupon eligibility and discount
//! - [`payment`] - Payment method eligibility and fees
//! - [`pricing`] - Typed pipeline composing the order total
//! - [`lifecycle`] - Order and payment status state machine
//! - [`guest`] - Guest account provisioning
//! - [`service`] - Orchestration over a [`CheckoutStore`]
//!
//! Storage goes through the [`CheckoutStore`] trait, implemented for
//! Postgres in [`crate::db`] and in memory in [`memory`].

pub mod coupon;
pub mod error;
pub mod guest;
pub mod lifecycle;
pub mod memory;
pub mod order_code;
pub mod payment;
pub mod pricing;
pub mod service;
pub mod shipping;
pub mod store;

pub use coupon::AppliedCoupon;
pub use error::{CheckoutError, ErrorCategory};
pub use guest::GuestContact;
pub use memory::MemoryCheckoutStore;
pub use payment::MethodOffer;
pub use service::{
    AddressInput, CartLine, CheckoutOptions, CheckoutService, CreateOrderRequest, OrderReceipt,
    Quote, QuoteRequest,
};
pub use shipping::ShippingQuote;
pub use store::{CheckoutStore, PaymentChange, StatusChange, StoreError};
