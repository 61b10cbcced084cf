//! Coupon validation and discount computation.
//!
//! Validation is read-only. The usage counter is only touched by the store
//! when the order commits, so abandoned checkouts never consume a coupon.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use souk_core::{CouponCode, CouponId, CurrencyCode};

use super::error::CheckoutError;
use crate::models::{Coupon, DiscountType};

/// A coupon that passed validation, with the discount it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedCoupon {
    #[serde(skip)]
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub discount: Decimal,
}

/// Validate `coupon` (looked up by `code`) against a cart.
///
/// Checks run in a fixed order and stop at the first failure: existence and
/// active flag, validity window, remaining uses, minimum subtotal.
///
/// # Errors
///
/// Returns `CouponNotFound`, `CouponExpired`, `CouponExhausted` or
/// `CouponMinimumNotMet`.
pub fn validate_coupon(
    code: &CouponCode,
    coupon: Option<&Coupon>,
    subtotal: Decimal,
    currency: CurrencyCode,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CheckoutError> {
    let coupon = coupon
        .filter(|c| c.active && c.currency.is_none_or(|cur| cur == currency))
        .ok_or_else(|| CheckoutError::CouponNotFound(code.clone()))?;

    if !coupon.is_within_window(now) {
        return Err(CheckoutError::CouponExpired(coupon.code.clone()));
    }

    if !coupon.has_remaining_uses() {
        return Err(CheckoutError::CouponExhausted {
            code: coupon.code.clone(),
            at_commit: false,
        });
    }

    if subtotal < coupon.minimum_amount {
        return Err(CheckoutError::CouponMinimumNotMet {
            code: coupon.code.clone(),
            minimum: coupon.minimum_amount,
        });
    }

    Ok(AppliedCoupon {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        discount: compute_discount(coupon, subtotal, currency),
    })
}

/// Discount granted by `coupon` on `subtotal`.
///
/// Never negative and never above the subtotal. Percentage discounts are
/// additionally capped by `maximum_discount`.
#[must_use]
pub fn compute_discount(coupon: &Coupon, subtotal: Decimal, currency: CurrencyCode) -> Decimal {
    let subtotal = subtotal.max(Decimal::ZERO);
    let raw = match coupon.discount_type {
        DiscountType::Fixed => coupon.value,
        DiscountType::Percentage => {
            let pct = subtotal * coupon.value / Decimal::ONE_HUNDRED;
            match coupon.maximum_discount {
                Some(cap) => pct.min(cap.max(Decimal::ZERO)),
                None => pct,
            }
        }
    };
    currency
        .round(raw.max(Decimal::ZERO).min(subtotal))
        .min(subtotal)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    fn welcome20() -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: CouponCode::parse("WELCOME20").unwrap(),
            discount_type: DiscountType::Percentage,
            value: Decimal::from(20),
            minimum_amount: Decimal::from(200),
            maximum_discount: None,
            usage_limit: Some(100),
            used_count: 0,
            active: true,
            starts_at: None,
            expires_at: None,
            currency: None,
        }
    }

    fn validate(coupon: &Coupon, subtotal: i64) -> Result<AppliedCoupon, CheckoutError> {
        validate_coupon(
            &coupon.code,
            Some(coupon),
            Decimal::from(subtotal),
            CurrencyCode::MAD,
            Utc::now(),
        )
    }

    #[test]
    fn test_welcome20_on_300() {
        let applied = validate(&welcome20(), 300).unwrap();
        assert_eq!(applied.discount, Decimal::from(60));
        assert_eq!(applied.code.as_str(), "WELCOME20");
    }

    #[test]
    fn test_welcome20_on_150_misses_minimum() {
        let err = validate(&welcome20(), 150).unwrap_err();
        assert!(matches!(err, CheckoutError::CouponMinimumNotMet { minimum, .. } if minimum == Decimal::from(200)));
    }

    #[test]
    fn test_unknown_or_inactive_is_not_found() {
        let code = CouponCode::parse("NOPE").unwrap();
        let err = validate_coupon(&code, None, Decimal::from(300), CurrencyCode::MAD, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CouponNotFound(_)));

        let inactive = Coupon {
            active: false,
            ..welcome20()
        };
        assert!(matches!(
            validate(&inactive, 300),
            Err(CheckoutError::CouponNotFound(_))
        ));
    }

    #[test]
    fn test_other_currency_is_not_found() {
        let eur = Coupon {
            currency: Some(CurrencyCode::EUR),
            ..welcome20()
        };
        assert!(matches!(
            validate(&eur, 300),
            Err(CheckoutError::CouponNotFound(_))
        ));
    }

    #[test]
    fn test_expired_checked_before_exhausted() {
        let coupon = Coupon {
            expires_at: Some(Utc::now() - Duration::days(1)),
            usage_limit: Some(1),
            used_count: 1,
            ..welcome20()
        };
        assert!(matches!(
            validate(&coupon, 300),
            Err(CheckoutError::CouponExpired(_))
        ));
    }

    #[test]
    fn test_not_yet_started_is_expired() {
        let coupon = Coupon {
            starts_at: Some(Utc::now() + Duration::days(1)),
            ..welcome20()
        };
        assert!(matches!(
            validate(&coupon, 300),
            Err(CheckoutError::CouponExpired(_))
        ));
    }

    #[test]
    fn test_exhausted_checked_before_minimum() {
        let coupon = Coupon {
            usage_limit: Some(3),
            used_count: 3,
            ..welcome20()
        };
        assert!(matches!(
            validate(&coupon, 10),
            Err(CheckoutError::CouponExhausted {
                at_commit: false,
                ..
            })
        ));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let coupon = Coupon {
            discount_type: DiscountType::Fixed,
            value: Decimal::from(100),
            minimum_amount: Decimal::ZERO,
            ..welcome20()
        };
        assert_eq!(validate(&coupon, 80).unwrap().discount, Decimal::from(80));
        assert_eq!(validate(&coupon, 250).unwrap().discount, Decimal::from(100));
    }

    #[test]
    fn test_percentage_discount_capped() {
        let coupon = Coupon {
            maximum_discount: Some(Decimal::from(50)),
            ..welcome20()
        };
        assert_eq!(validate(&coupon, 1000).unwrap().discount, Decimal::from(50));
    }

    #[test]
    fn test_percentage_discount_rounds_to_minor_unit() {
        let coupon = Coupon {
            value: Decimal::new(125, 1),
            minimum_amount: Decimal::ZERO,
            ..welcome20()
        };
        // 12.5% of 99.99 = 12.49875
        let discount = compute_discount(&coupon, Decimal::new(9999, 2), CurrencyCode::MAD);
        assert_eq!(discount, Decimal::new(1250, 2));
    }

    proptest! {
        #[test]
        fn prop_discount_within_bounds(
            subtotal_cents in 0i64..10_000_000,
            value_cents in 0i64..20_000_000,
            cap_cents in proptest::option::of(0i64..5_000_000),
            percentage in any::<bool>(),
        ) {
            let subtotal = Decimal::new(subtotal_cents, 2);
            let coupon = Coupon {
                discount_type: if percentage { DiscountType::Percentage } else { DiscountType::Fixed },
                value: if percentage {
                    Decimal::new(value_cents % 10_001, 2)
                } else {
                    Decimal::new(value_cents, 2)
                },
                maximum_discount: cap_cents.map(|c| Decimal::new(c, 2)),
                ..welcome20()
            };
            let discount = compute_discount(&coupon, subtotal, CurrencyCode::MAD);
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
            if let (true, Some(cap)) = (percentage, coupon.maximum_discount) {
                prop_assert!(discount <= cap);
            }
        }
    }
}
