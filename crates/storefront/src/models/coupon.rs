//! Discount coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{CouponCode, CouponId, CurrencyCode};

/// How a coupon's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storefront.discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// A fixed amount off the subtotal.
    Fixed,
    /// A percentage of the subtotal.
    Percentage,
}

/// A discount coupon with its eligibility rules and usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Amount (fixed) or percent (percentage).
    pub value: Decimal,
    /// Smallest subtotal the coupon applies to.
    pub minimum_amount: Decimal,
    /// Cap on percentage discounts.
    pub maximum_discount: Option<Decimal>,
    /// `None` means unlimited.
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Currency a fixed-amount coupon is denominated in.
    pub currency: Option<CurrencyCode>,
}

impl Coupon {
    /// Whether the coupon is bound to a single order.
    ///
    /// Only these coupons get their redemption released when the order is
    /// cancelled.
    #[must_use]
    pub const fn is_single_use(&self) -> bool {
        matches!(self.usage_limit, Some(1))
    }

    /// Whether at least one redemption is left.
    #[must_use]
    pub fn has_remaining_uses(&self) -> bool {
        self.usage_limit.is_none_or(|limit| self.used_count < limit)
    }

    /// Whether `now` falls inside the validity window. Missing bounds are open.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|start| start <= now)
            && self.expires_at.is_none_or(|end| now <= end)
    }
}

/// Data for creating a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default)]
    pub minimum_amount: Decimal,
    #[serde(default)]
    pub maximum_discount: Option<Decimal>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon() -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: CouponCode::parse("WELCOME20").unwrap(),
            discount_type: DiscountType::Percentage,
            value: Decimal::from(20),
            minimum_amount: Decimal::from(200),
            maximum_discount: None,
            usage_limit: None,
            used_count: 0,
            active: true,
            starts_at: None,
            expires_at: None,
            currency: None,
        }
    }

    #[test]
    fn test_open_window() {
        assert!(coupon().is_within_window(Utc::now()));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let now = Utc::now();
        let c = Coupon {
            starts_at: Some(now),
            expires_at: Some(now),
            ..coupon()
        };
        assert!(c.is_within_window(now));
        assert!(!c.is_within_window(now + Duration::seconds(1)));
        assert!(!c.is_within_window(now - Duration::seconds(1)));
    }

    #[test]
    fn test_remaining_uses() {
        let c = Coupon {
            usage_limit: Some(2),
            used_count: 1,
            ..coupon()
        };
        assert!(c.has_remaining_uses());
        let c = Coupon {
            used_count: 2,
            ..c
        };
        assert!(!c.has_remaining_uses());
        assert!(coupon().has_remaining_uses());
    }

    #[test]
    fn test_single_use() {
        assert!(
            Coupon {
                usage_limit: Some(1),
                ..coupon()
            }
            .is_single_use()
        );
        assert!(!coupon().is_single_use());
    }
}
