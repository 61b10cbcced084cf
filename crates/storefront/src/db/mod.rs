//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! - `product` - Catalog snapshot (name, sku, price, stock)
//! - `coupon` - Discount codes and their usage counters
//! - `shipping_rate` - Cost per (region, city)
//! - `payment_method` - Configured payment methods
//! - `setting` - Checkout settings (key/value)
//! - `customer` - Registered and guest accounts
//! - `order` / `order_item` - Placed orders and line snapshots
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p souk-cli -- migrate
//! ```

pub mod coupons;
pub mod customers;
pub mod orders;
pub mod payment_methods;
pub mod products;
pub mod settings;
pub mod shipping;
pub mod store;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use coupons::CouponRepository;
pub use customers::CustomerRepository;
pub use orders::OrderRepository;
pub use payment_methods::PaymentMethodRepository;
pub use products::ProductRepository;
pub use settings::SettingsRepository;
pub use shipping::ShippingRateRepository;
pub use store::PgCheckoutStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, anything else into `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
