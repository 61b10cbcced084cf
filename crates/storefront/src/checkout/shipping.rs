//! Shipping cost resolution.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::CheckoutError;
use crate::models::{CheckoutSettings, Destination, ShippingRate};

/// Outcome of resolving the shipping cost for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShippingQuote {
    /// The subtotal is above the free-shipping threshold.
    Free,
    /// A concrete rate, from the city table or the default rate.
    Rate { amount: Decimal },
    /// No destination chosen yet. Not free, not priced.
    Indeterminate,
    /// No rate for the destination. Quotes show it, orders are refused.
    Unavailable,
}

impl ShippingQuote {
    /// The cost, if it is known.
    #[must_use]
    pub const fn amount(self) -> Option<Decimal> {
        match self {
            Self::Free => Some(Decimal::ZERO),
            Self::Rate { amount } => Some(amount),
            Self::Indeterminate | Self::Unavailable => None,
        }
    }

    /// The cost, as required to complete an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ShippingUnresolved` unless the cost is known.
    pub fn require(self) -> Result<Decimal, CheckoutError> {
        match self.amount() {
            Some(amount) => Ok(amount),
            None => Err(CheckoutError::ShippingUnresolved),
        }
    }
}

/// Resolve the shipping cost for `destination`.
///
/// A subtotal strictly above the free-shipping threshold ships free whatever
/// the destination. Otherwise the city is looked up (a rate scoped to the
/// destination region wins over other rates for the same city), falling back
/// to the default rate.
///
/// # Errors
///
/// Returns `CheckoutError::ShippingUnresolved` when the city has no rate and
/// no default rate is configured.
pub fn resolve_shipping(
    destination: &Destination,
    subtotal: Decimal,
    settings: &CheckoutSettings,
    rates: &[ShippingRate],
) -> Result<ShippingQuote, CheckoutError> {
    if settings
        .free_shipping_threshold
        .is_some_and(|threshold| subtotal > threshold)
    {
        return Ok(ShippingQuote::Free);
    }

    let Some(city) = destination.city() else {
        return Ok(ShippingQuote::Indeterminate);
    };

    let in_region = destination.region().and_then(|region| {
        rates
            .iter()
            .find(|r| r.matches_city(city) && r.matches_region(region))
    });
    let rate = in_region.or_else(|| rates.iter().find(|r| r.matches_city(city)));

    match (rate, settings.default_shipping_rate) {
        (Some(rate), _) => Ok(ShippingQuote::Rate { amount: rate.cost }),
        (None, Some(default)) => Ok(ShippingQuote::Rate { amount: default }),
        (None, None) => Err(CheckoutError::ShippingUnresolved),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use souk_core::ShippingRateId;

    use super::*;

    fn rate(id: i64, region: Option<&str>, city: &str, cost: i64) -> ShippingRate {
        ShippingRate {
            id: ShippingRateId::new(id),
            region: region.map(str::to_owned),
            city: city.to_owned(),
            cost: Decimal::from(cost),
        }
    }

    fn rates() -> Vec<ShippingRate> {
        vec![
            rate(1, None, "Casablanca", 50),
            rate(2, Some("Oriental"), "Oujda", 70),
            rate(3, Some("Souss-Massa"), "Agadir", 60),
            rate(4, Some("Draa-Tafilalet"), "Agadir", 90),
        ]
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            free_shipping_threshold: Some(Decimal::from(500)),
            default_shipping_rate: None,
            flat_tax: Decimal::ZERO,
        }
    }

    fn to(city: &str) -> Destination {
        Destination {
            region: None,
            city: Some(city.to_owned()),
        }
    }

    #[test]
    fn test_below_threshold_uses_city_rate() {
        let quote =
            resolve_shipping(&to("Casablanca"), Decimal::from(450), &settings(), &rates()).unwrap();
        assert_eq!(quote, ShippingQuote::Rate { amount: Decimal::from(50) });
    }

    #[test]
    fn test_above_threshold_is_free_anywhere() {
        let quote =
            resolve_shipping(&to("Nowhere"), Decimal::from(520), &settings(), &rates()).unwrap();
        assert_eq!(quote, ShippingQuote::Free);
        assert_eq!(quote.require().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_threshold_is_strict() {
        let quote =
            resolve_shipping(&to("Casablanca"), Decimal::from(500), &settings(), &rates()).unwrap();
        assert_eq!(quote, ShippingQuote::Rate { amount: Decimal::from(50) });
    }

    #[test]
    fn test_city_match_ignores_case_and_whitespace() {
        let quote =
            resolve_shipping(&to("  casablanca "), Decimal::ONE, &settings(), &rates()).unwrap();
        assert_eq!(quote.amount(), Some(Decimal::from(50)));
    }

    #[test]
    fn test_region_scoped_rate_wins() {
        let destination = Destination {
            region: Some("draa-tafilalet".to_owned()),
            city: Some("Agadir".to_owned()),
        };
        let quote = resolve_shipping(&destination, Decimal::ONE, &settings(), &rates()).unwrap();
        assert_eq!(quote.amount(), Some(Decimal::from(90)));
    }

    #[test]
    fn test_missing_city_is_indeterminate_not_free() {
        let destination = Destination {
            region: Some("Oriental".to_owned()),
            city: Some("   ".to_owned()),
        };
        let quote = resolve_shipping(&destination, Decimal::ONE, &settings(), &rates()).unwrap();
        assert_eq!(quote, ShippingQuote::Indeterminate);
        assert_eq!(quote.amount(), None);
        assert!(matches!(
            quote.require(),
            Err(CheckoutError::ShippingUnresolved)
        ));
    }

    #[test]
    fn test_unknown_city_falls_back_to_default() {
        let settings = CheckoutSettings {
            default_shipping_rate: Some(Decimal::from(45)),
            ..settings()
        };
        let quote = resolve_shipping(&to("Ifrane"), Decimal::ONE, &settings, &rates()).unwrap();
        assert_eq!(quote.amount(), Some(Decimal::from(45)));
    }

    #[test]
    fn test_unknown_city_without_default_is_unresolved() {
        let result = resolve_shipping(&to("Ifrane"), Decimal::ONE, &settings(), &rates());
        assert!(matches!(result, Err(CheckoutError::ShippingUnresolved)));
    }

    #[test]
    fn test_no_threshold_never_free() {
        let settings = CheckoutSettings {
            free_shipping_threshold: None,
            ..settings()
        };
        let quote =
            resolve_shipping(&to("Casablanca"), Decimal::from(10_000), &settings, &rates()).unwrap();
        assert_eq!(quote.amount(), Some(Decimal::from(50)));
    }
}
