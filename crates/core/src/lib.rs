//! Souk Core - Shared domain types.
//!
//! This crate provides the types shared by all Souk components:
//! - `storefront` - Checkout engine and HTTP service
//! - `cli` - Migrations, seeding and back-office commands
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Database encoding is opt-in through the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, emails, coupon codes and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
