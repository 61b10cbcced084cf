//! Shipping rate repository.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use souk_core::ShippingRateId;

use super::RepositoryError;
use crate::models::{NewShippingRate, ShippingRate};

#[derive(Debug, FromRow)]
struct ShippingRateRow {
    id: i64,
    region: Option<String>,
    city: String,
    cost: Decimal,
}

impl From<ShippingRateRow> for ShippingRate {
    fn from(row: ShippingRateRow) -> Self {
        Self {
            id: ShippingRateId::new(row.id),
            region: row.region,
            city: row.city,
            cost: row.cost,
        }
    }
}

/// Repository for shipping rates.
pub struct ShippingRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All rates, region-scoped ones first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ShippingRate>, RepositoryError> {
        let rows: Vec<ShippingRateRow> = sqlx::query_as(
            r"
            SELECT id, region, city, cost
            FROM storefront.shipping_rate
            ORDER BY region NULLS LAST, city
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ShippingRate::from).collect())
    }

    /// Create a rate, or update the cost of the existing (region, city) pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, rate: &NewShippingRate) -> Result<ShippingRate, RepositoryError> {
        let row: ShippingRateRow = sqlx::query_as(
            r"
            INSERT INTO storefront.shipping_rate (region, city, cost)
            VALUES (NULLIF(TRIM($1), ''), TRIM($2), $3)
            ON CONFLICT (LOWER(COALESCE(region, '')), LOWER(city)) DO UPDATE
            SET cost = EXCLUDED.cost
            RETURNING id, region, city, cost
            ",
        )
        .bind(rate.region.as_deref())
        .bind(&rate.city)
        .bind(rate.cost)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
