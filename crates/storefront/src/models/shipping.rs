//! Shipping rates and destinations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::ShippingRateId;

/// Configured shipping cost for a city, optionally scoped to a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub id: ShippingRateId,
    pub region: Option<String>,
    pub city: String,
    pub cost: Decimal,
}

impl ShippingRate {
    /// Whether this rate applies to `city` (trimmed, case-insensitive).
    #[must_use]
    pub fn matches_city(&self, city: &str) -> bool {
        self.city.trim().eq_ignore_ascii_case(city.trim())
    }

    /// Whether this rate is scoped to `region` (trimmed, case-insensitive).
    #[must_use]
    pub fn matches_region(&self, region: &str) -> bool {
        self.region
            .as_deref()
            .is_some_and(|r| r.trim().eq_ignore_ascii_case(region.trim()))
    }
}

/// Data for creating or updating a shipping rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShippingRate {
    #[serde(default)]
    pub region: Option<String>,
    pub city: String,
    pub cost: Decimal,
}

/// Where an order ships to, as far as pricing is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Destination {
    /// The city, if one was given and is not blank.
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// The region, if one was given and is not blank.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}
