//! Seed the catalog from a YAML file.
//!
//! Products, shipping rates and payment methods are upserted by their natural
//! key, so a seed file can be applied repeatedly. Coupons that already exist
//! are left alone. A setting set to `null` is removed.
//!
//! ```yaml
//! products:
//!   - { name: Argan Oil 100ml, sku: ARG-100, price: "120.00", quantity: 40 }
//! shipping_rates:
//!   - { city: Casablanca, cost: "25" }
//!   - { region: Souss-Massa, city: Agadir, cost: "40" }
//! coupons:
//!   - { code: WELCOME20, discount_type: percentage, value: "20", minimum_amount: "200" }
//! payment_methods:
//!   - code: cod
//!     name: Cash on delivery
//!     kind: cash
//!     fee_fixed: "10"
//! settings:
//!   free_shipping_threshold: "500"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use souk_storefront::db::{
    CouponRepository, PaymentMethodRepository, ProductRepository, RepositoryError,
    SettingsRepository, ShippingRateRepository,
};
use souk_storefront::models::{NewCoupon, NewPaymentMethod, NewProduct, NewShippingRate};

use super::{CommandError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Contents of a seed file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<NewProduct>,
    #[serde(default)]
    pub shipping_rates: Vec<NewShippingRate>,
    #[serde(default)]
    pub coupons: Vec<NewCoupon>,
    #[serde(default)]
    pub payment_methods: Vec<NewPaymentMethod>,
    #[serde(default)]
    pub settings: BTreeMap<String, Option<Decimal>>,
}

/// Counts reported after seeding.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub products: usize,
    pub shipping_rates: usize,
    pub coupons_created: usize,
    pub coupons_skipped: usize,
    pub payment_methods: usize,
    pub settings: usize,
}

/// Parse and apply a seed file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a row is
/// rejected by the database. Rows applied before the failure stay applied.
pub async fn from_file(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_string()));
    }

    info!(path = %file_path, "Loading seed file");

    // Parse before connecting so a broken file never touches the database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let pool = connect().await?;
    let summary = apply(&pool, &seed).await?;

    info!("Seeding complete!");
    info!("  Products: {}", summary.products);
    info!("  Shipping rates: {}", summary.shipping_rates);
    info!(
        "  Coupons: {} created, {} already present",
        summary.coupons_created, summary.coupons_skipped
    );
    info!("  Payment methods: {}", summary.payment_methods);
    info!("  Settings: {}", summary.settings);
    Ok(())
}

/// Apply a parsed seed file.
///
/// # Errors
///
/// Returns the first repository error.
pub async fn apply(pool: &PgPool, seed: &SeedFile) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    let products = ProductRepository::new(pool);
    for product in &seed.products {
        products.upsert(product).await?;
        summary.products += 1;
    }

    let rates = ShippingRateRepository::new(pool);
    for rate in &seed.shipping_rates {
        rates.upsert(rate).await?;
        summary.shipping_rates += 1;
    }

    let coupons = CouponRepository::new(pool);
    for coupon in &seed.coupons {
        match coupons.create(coupon).await {
            Ok(_) => summary.coupons_created += 1,
            Err(RepositoryError::Conflict(_)) => {
                warn!(code = %coupon.code, "Coupon already exists, skipping");
                summary.coupons_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let methods = PaymentMethodRepository::new(pool);
    for method in &seed.payment_methods {
        methods.upsert(method).await?;
        summary.payment_methods += 1;
    }

    let settings = SettingsRepository::new(pool);
    for (key, value) in &seed.settings {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        settings.set(key, &value).await?;
        summary.settings += 1;
    }

    Ok(summary)
}
