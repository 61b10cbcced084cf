//! Case-insensitive coupon codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CouponCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponCodeError {
    /// The code is empty after trimming.
    #[error("coupon code cannot be empty")]
    Empty,
    /// The code is longer than allowed.
    #[error("coupon code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The code contains characters other than letters, digits, `-` or `_`.
    #[error("coupon code contains invalid characters")]
    InvalidCharacters,
}

/// A coupon code, case-folded to upper case.
///
/// `welcome20`, ` Welcome20 ` and `WELCOME20` all parse to the same code, so
/// lookups and the database unique index agree on identity.
///
/// ```
/// use souk_core::CouponCode;
///
/// let code = CouponCode::parse(" welcome20 ").unwrap();
/// assert_eq!(code.as_str(), "WELCOME20");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Maximum length of a coupon code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse and normalize a coupon code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(s: &str) -> Result<Self, CouponCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CouponCodeError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(CouponCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponCodeError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CouponCode {
    type Err = CouponCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}
