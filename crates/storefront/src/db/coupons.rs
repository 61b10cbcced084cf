//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use souk_core::{CouponCode, CouponId, CurrencyCode};

use super::RepositoryError;
use crate::models::{Coupon, DiscountType, NewCoupon};

pub(crate) const COUPON_COLUMNS: &str = "id, code, discount_type, value, minimum_amount, \
     maximum_discount, usage_limit, used_count, active, starts_at, expires_at, currency";

#[derive(Debug, FromRow)]
pub(crate) struct CouponRow {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub minimum_amount: Decimal,
    pub maximum_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub currency: Option<CurrencyCode>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let code = CouponCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid coupon code in database: {e}"))
        })?;
        Ok(Self {
            id: CouponId::new(row.id),
            code,
            discount_type: row.discount_type,
            value: row.value,
            minimum_amount: row.minimum_amount,
            maximum_discount: row.maximum_discount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            active: row.active,
            starts_at: row.starts_at,
            expires_at: row.expires_at,
            currency: row.currency,
        })
    }
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by code, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored code is invalid.
    pub async fn get_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon WHERE UPPER(code) = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let row: CouponRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.coupon
                (code, discount_type, value, minimum_amount, maximum_discount,
                 usage_limit, starts_at, expires_at, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(coupon.code.as_str())
        .bind(coupon.discount_type)
        .bind(coupon.value)
        .bind(coupon.minimum_amount)
        .bind(coupon.maximum_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.currency)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "coupon"))?;

        row.try_into()
    }

    /// Deactivate a coupon. Returns `false` if no coupon has the code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate(&self, code: &CouponCode) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE storefront.coupon SET active = FALSE WHERE UPPER(code) = $1")
            .bind(code.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
