//! Checkout settings stored as key/value pairs.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::CheckoutSettings;

/// Setting keys understood by checkout.
pub mod keys {
    pub const FREE_SHIPPING_THRESHOLD: &str = "free_shipping_threshold";
    pub const DEFAULT_SHIPPING_RATE: &str = "default_shipping_rate";
    pub const FLAT_TAX: &str = "flat_tax";

    pub const ALL: [&str; 3] = [FREE_SHIPPING_THRESHOLD, DEFAULT_SHIPPING_RATE, FLAT_TAX];
}

/// Repository for the `setting` table.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load every checkout setting in one query.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a value is not a decimal.
    pub async fn load(&self) -> Result<CheckoutSettings, RepositoryError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM storefront.setting WHERE key = ANY($1)")
                .bind(&keys::ALL[..])
                .fetch_all(self.pool)
                .await?;

        settings_from_pairs(rows.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Set a setting. An empty value clears it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for unknown keys or non-decimal
    /// values, `RepositoryError::Database` if the query fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        if !keys::ALL.contains(&key) {
            return Err(RepositoryError::Conflict(format!("unknown setting {key}")));
        }
        let value = value.trim();
        if value.is_empty() {
            sqlx::query("DELETE FROM storefront.setting WHERE key = $1")
                .bind(key)
                .execute(self.pool)
                .await?;
            return Ok(());
        }
        Decimal::from_str(value)
            .map_err(|e| RepositoryError::Conflict(format!("{key} must be a decimal: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO storefront.setting (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

/// Build a settings snapshot from raw pairs. Unknown keys are ignored.
pub(crate) fn settings_from_pairs<'s>(
    pairs: impl IntoIterator<Item = (&'s str, &'s str)>,
) -> Result<CheckoutSettings, RepositoryError> {
    let mut settings = CheckoutSettings::default();
    for (key, value) in pairs {
        let parse = || {
            Decimal::from_str(value.trim()).map_err(|e| {
                RepositoryError::DataCorruption(format!("setting {key} is not a decimal: {e}"))
            })
        };
        match key {
            keys::FREE_SHIPPING_THRESHOLD => settings.free_shipping_threshold = Some(parse()?),
            keys::DEFAULT_SHIPPING_RATE => settings.default_shipping_rate = Some(parse()?),
            keys::FLAT_TAX => settings.flat_tax = parse()?,
            _ => {}
        }
    }
    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_pairs() {
        let settings = settings_from_pairs([
            ("free_shipping_threshold", "500"),
            ("flat_tax", " 2.50 "),
            ("theme", "dark"),
        ])
        .unwrap();
        assert_eq!(settings.free_shipping_threshold, Some(Decimal::from(500)));
        assert_eq!(settings.default_shipping_rate, None);
        assert_eq!(settings.flat_tax, Decimal::new(250, 2));
    }

    #[test]
    fn test_settings_reject_garbage() {
        assert!(matches!(
            settings_from_pairs([("flat_tax", "ten")]),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
