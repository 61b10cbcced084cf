//! Coupon management commands.
//!
//! # Usage
//!
//! ```bash
//! # 20% off orders over 200, at most 100 redemptions
//! souk-cli coupon create -c WELCOME20 -t percentage -v 20 --minimum 200 --limit 100
//!
//! # 50 off, MAD carts only, until the end of Ramadan
//! souk-cli coupon create -c RAMADAN50 -t fixed -v 50 --currency MAD \
//!     --expires-at 2026-03-20T00:00:00Z
//!
//! souk-cli coupon deactivate RAMADAN50
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use souk_core::{CouponCode, CurrencyCode};
use souk_storefront::db::CouponRepository;
use souk_storefront::models::{DiscountType, NewCoupon};

use super::{CommandError, connect};

/// Raw `coupon create` arguments.
pub struct CouponArgs<'a> {
    pub code: &'a str,
    pub discount_type: &'a str,
    pub value: Decimal,
    pub minimum: Decimal,
    pub max_discount: Option<Decimal>,
    pub limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub currency: Option<&'a str>,
}

/// Validate the arguments into a coupon ready to insert.
///
/// # Errors
///
/// Returns `InvalidArgument` for a malformed code, type, amount or window.
pub fn build(args: CouponArgs<'_>) -> Result<NewCoupon, CommandError> {
    let code = CouponCode::parse(args.code)
        .map_err(|e| CommandError::InvalidArgument("code", e.to_string()))?;

    let discount_type = match args.discount_type.trim().to_lowercase().as_str() {
        "fixed" => DiscountType::Fixed,
        "percentage" | "percent" => DiscountType::Percentage,
        other => {
            return Err(CommandError::InvalidArgument(
                "type",
                format!("{other} (expected fixed or percentage)"),
            ));
        }
    };

    if args.value <= Decimal::ZERO {
        return Err(CommandError::InvalidArgument(
            "value",
            "must be positive".to_string(),
        ));
    }
    if discount_type == DiscountType::Percentage && args.value > Decimal::ONE_HUNDRED {
        return Err(CommandError::InvalidArgument(
            "value",
            "a percentage cannot exceed 100".to_string(),
        ));
    }
    if args.minimum < Decimal::ZERO {
        return Err(CommandError::InvalidArgument(
            "minimum",
            "cannot be negative".to_string(),
        ));
    }
    if args.limit.is_some_and(|limit| limit < 1) {
        return Err(CommandError::InvalidArgument(
            "limit",
            "must be at least 1".to_string(),
        ));
    }
    if let (Some(starts), Some(expires)) = (args.starts_at, args.expires_at)
        && expires <= starts
    {
        return Err(CommandError::InvalidArgument(
            "expires-at",
            "must be after starts-at".to_string(),
        ));
    }

    let currency = args
        .currency
        .map(str::parse::<CurrencyCode>)
        .transpose()
        .map_err(|e| CommandError::InvalidArgument("currency", e.to_string()))?;

    Ok(NewCoupon {
        code,
        discount_type,
        value: args.value,
        minimum_amount: args.minimum,
        maximum_discount: args.max_discount,
        usage_limit: args.limit,
        starts_at: args.starts_at,
        expires_at: args.expires_at,
        currency,
    })
}

/// Insert a coupon.
///
/// # Errors
///
/// Returns an error if the code is taken or the database is unreachable.
pub async fn create(coupon: &NewCoupon) -> Result<(), CommandError> {
    let pool = connect().await?;
    let created = CouponRepository::new(&pool).create(coupon).await?;

    tracing::info!(
        code = %created.code,
        id = %created.id,
        "Coupon created"
    );
    Ok(())
}

/// Deactivate a coupon so it can no longer be redeemed.
///
/// # Errors
///
/// Returns `NotFound` if no coupon has this code.
pub async fn deactivate(code: &str) -> Result<(), CommandError> {
    let code = CouponCode::parse(code)
        .map_err(|e| CommandError::InvalidArgument("code", e.to_string()))?;

    let pool = connect().await?;
    if !CouponRepository::new(&pool).deactivate(&code).await? {
        return Err(CommandError::NotFound("coupon", code.to_string()));
    }

    tracing::info!(code = %code, "Coupon deactivated");
    Ok(())
}
