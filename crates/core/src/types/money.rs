//! Monetary amounts with currency-aware rounding.
//!
//! Amounts are `Decimal` values in the currency's standard unit (dirhams,
//! euros, dollars), never floats. Every stored or displayed amount is rounded
//! to the currency's minor unit with half-away-from-zero rounding.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors produced by money and currency parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The currency code is not supported by the store.
    #[error("unsupported currency code: {0}")]
    UnknownCurrency(String),
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the left-hand side.
        expected: CurrencyCode,
        /// Currency of the right-hand side.
        found: CurrencyCode,
    },
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    MAD,
    EUR,
    USD,
    GBP,
    CAD,
    AUD,
    JPY,
}

impl CurrencyCode {
    /// All supported currencies.
    pub const ALL: [Self; 7] = [
        Self::MAD,
        Self::EUR,
        Self::USD,
        Self::GBP,
        Self::CAD,
        Self::AUD,
        Self::JPY,
    ];

    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MAD => "MAD",
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::JPY => "JPY",
        }
    }

    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::JPY => 0,
            _ => 2,
        }
    }

    /// Round an amount to this currency's minor unit (half away from zero).
    #[must_use]
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_units(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| MoneyError::UnknownCurrency(trimmed.to_owned()))
    }
}

/// An amount of money in a given currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount, rounded to the currency's minor unit.
    #[must_use]
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self {
            amount: currency.round(amount),
            currency,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` if the currencies differ.
    pub fn try_add(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.minor_units() as usize;
        write!(f, "{:.dp$} {}", self.amount, self.currency)
    }
}

// SQLx support (with postgres feature): currencies are stored as CHAR(3)/TEXT.
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CurrencyCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CurrencyCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CurrencyCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(
            CurrencyCode::MAD.round(Decimal::new(10_005, 3)),
            Decimal::new(1001, 2)
        );
        assert_eq!(
            CurrencyCode::MAD.round(Decimal::new(10_004, 3)),
            Decimal::new(1000, 2)
        );
    }

    #[test]
    fn test_zero_decimal_currency() {
        assert_eq!(CurrencyCode::JPY.round(Decimal::new(1995, 1)), Decimal::new(200, 0));
    }

    #[test]
    fn test_parse_currency_case_insensitive() {
        assert_eq!(" mad ".parse::<CurrencyCode>().unwrap(), CurrencyCode::MAD);
        assert_eq!("Eur".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!(matches!(
            "XYZ".parse::<CurrencyCode>(),
            Err(MoneyError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn test_money_display() {
        let m = Money::new(Decimal::new(450, 0), CurrencyCode::MAD);
        assert_eq!(m.to_string(), "450.00 MAD");
    }

    #[test]
    fn test_try_add_rejects_mixed_currencies() {
        let a = Money::new(Decimal::ONE, CurrencyCode::MAD);
        let b = Money::new(Decimal::ONE, CurrencyCode::EUR);
        assert!(matches!(
            a.try_add(b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
        let c = a.try_add(a).unwrap();
        assert_eq!(c.amount, Decimal::TWO);
    }
}
