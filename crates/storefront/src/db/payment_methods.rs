//! Payment method repository.
//!
//! The per-kind configuration is stored as `(kind, config jsonb)` and checked
//! against the kind whenever it is read or written.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use souk_core::{CurrencyCode, PaymentMethodId};

use super::RepositoryError;
use crate::models::{NewPaymentMethod, PaymentMethod, PaymentMethodConfig, PaymentMethodKind};

const PAYMENT_METHOD_COLUMNS: &str = "id, code, name, kind, config, enabled, fee_percentage, \
     fee_fixed, min_amount, max_amount, currencies, processing_time, sort_order";

#[derive(Debug, FromRow)]
struct PaymentMethodRow {
    id: i64,
    code: String,
    name: String,
    kind: PaymentMethodKind,
    config: serde_json::Value,
    enabled: bool,
    fee_percentage: Decimal,
    fee_fixed: Decimal,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
    currencies: Vec<String>,
    processing_time: Option<String>,
    sort_order: i32,
}

impl TryFrom<PaymentMethodRow> for PaymentMethod {
    type Error = RepositoryError;

    fn try_from(row: PaymentMethodRow) -> Result<Self, Self::Error> {
        let config = PaymentMethodConfig::from_parts(row.kind, row.config).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "payment method {} has invalid config: {e}",
                row.code
            ))
        })?;
        let currencies = row
            .currencies
            .iter()
            .map(|c| c.parse::<CurrencyCode>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: PaymentMethodId::new(row.id),
            code: row.code,
            name: row.name,
            config,
            enabled: row.enabled,
            fee_percentage: row.fee_percentage,
            fee_fixed: row.fee_fixed,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            currencies,
            processing_time: row.processing_time,
            sort_order: row.sort_order,
        })
    }
}

/// Repository for payment methods.
pub struct PaymentMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentMethodRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All methods, enabled or not, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored config does not
    /// match its kind.
    pub async fn list(&self) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let rows: Vec<PaymentMethodRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM storefront.payment_method ORDER BY sort_order, code"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(PaymentMethod::try_from).collect()
    }

    /// Create a method, or update the one with the same code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the config does not match the
    /// kind, `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        method: &NewPaymentMethod,
    ) -> Result<PaymentMethod, RepositoryError> {
        let (kind, config) = method
            .typed_config()
            .and_then(|c| c.to_parts())
            .map_err(|e| {
                RepositoryError::Conflict(format!("config does not match kind: {e}"))
            })?;
        let currencies: Vec<String> = method
            .currencies
            .iter()
            .map(|c| c.code().to_owned())
            .collect();

        let row: PaymentMethodRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.payment_method
                (code, name, kind, config, enabled, fee_percentage, fee_fixed,
                 min_amount, max_amount, currencies, processing_time, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                config = EXCLUDED.config,
                enabled = EXCLUDED.enabled,
                fee_percentage = EXCLUDED.fee_percentage,
                fee_fixed = EXCLUDED.fee_fixed,
                min_amount = EXCLUDED.min_amount,
                max_amount = EXCLUDED.max_amount,
                currencies = EXCLUDED.currencies,
                processing_time = EXCLUDED.processing_time,
                sort_order = EXCLUDED.sort_order
            RETURNING {PAYMENT_METHOD_COLUMNS}
            "
        ))
        .bind(&method.code)
        .bind(&method.name)
        .bind(kind)
        .bind(config)
        .bind(method.enabled)
        .bind(method.fee_percentage)
        .bind(method.fee_fixed)
        .bind(method.min_amount)
        .bind(method.max_amount)
        .bind(&currencies)
        .bind(method.processing_time.as_deref())
        .bind(method.sort_order)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Enable or disable a method. Methods are never deleted, since orders
    /// reference them. Returns `false` if no method has the code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_enabled(&self, code: &str, enabled: bool) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE storefront.payment_method SET enabled = $2 WHERE code = $1")
                .bind(code)
                .bind(enabled)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
