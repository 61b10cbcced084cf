//! Business settings read by the pricing components.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of the store-wide checkout settings.
///
/// Loaded once per request and passed explicitly to the shipping resolver and
/// the pricing pipeline, so two requests never observe a half-updated set of
/// values and tests can vary them freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Subtotals strictly above this ship for free. `None` disables free shipping.
    pub free_shipping_threshold: Option<Decimal>,
    /// Rate used when the destination city has no configured rate.
    pub default_shipping_rate: Option<Decimal>,
    /// Flat tax added to every order.
    pub flat_tax: Decimal,
}
