//! Souk storefront library.
//!
//! Checkout, pricing and order lifecycle for a single-currency catalog, served
//! over HTTP by the `souk-storefront` binary. Exposed as a library so the
//! engine can be driven directly in tests and by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
