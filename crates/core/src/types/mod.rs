//! Core types for Souk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coupon_code;
pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use coupon_code::{CouponCode, CouponCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, MoneyError};
pub use status::*;
