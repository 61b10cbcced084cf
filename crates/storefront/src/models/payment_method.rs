//! Payment methods and their per-kind configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{CurrencyCode, PaymentMethodId};

/// Kind of payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storefront.payment_method_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Gateway,
    Wallet,
    BankTransfer,
    Cash,
}

impl PaymentMethodKind {
    /// Whether orders paid this way need a charge intent from the gateway.
    #[must_use]
    pub const fn requires_charge(self) -> bool {
        matches!(self, Self::Gateway | Self::Wallet)
    }
}

/// Credentials for a card gateway.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCredentials {
    pub provider: String,
    pub merchant_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("provider", &self.provider)
            .field("merchant_id", &self.merchant_id)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for a mobile wallet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCredentials {
    pub provider: String,
    pub account_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("provider", &self.provider)
            .field("account_id", &self.account_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Bank account details shown to customers paying by transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_holder: String,
    pub iban: String,
    #[serde(default)]
    pub swift: Option<String>,
}

/// Configuration of a payment method, one variant per kind.
///
/// The kind is carried by the variant, so a bank-transfer method cannot hold
/// gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethodConfig {
    Gateway(GatewayCredentials),
    Wallet(WalletCredentials),
    BankTransfer(BankDetails),
    Cash,
}

impl PaymentMethodConfig {
    #[must_use]
    pub const fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::Gateway(_) => PaymentMethodKind::Gateway,
            Self::Wallet(_) => PaymentMethodKind::Wallet,
            Self::BankTransfer(_) => PaymentMethodKind::BankTransfer,
            Self::Cash => PaymentMethodKind::Cash,
        }
    }

    /// Rebuild the configuration from its stored `(kind, json)` form.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not have the shape `kind` requires.
    pub fn from_parts(
        kind: PaymentMethodKind,
        config: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            PaymentMethodKind::Gateway => Self::Gateway(serde_json::from_value(config)?),
            PaymentMethodKind::Wallet => Self::Wallet(serde_json::from_value(config)?),
            PaymentMethodKind::BankTransfer => Self::BankTransfer(serde_json::from_value(config)?),
            PaymentMethodKind::Cash => Self::Cash,
        })
    }

    /// Split into the stored `(kind, json)` form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_parts(&self) -> Result<(PaymentMethodKind, serde_json::Value), serde_json::Error> {
        let value = match self {
            Self::Gateway(c) => serde_json::to_value(c)?,
            Self::Wallet(c) => serde_json::to_value(c)?,
            Self::BankTransfer(d) => serde_json::to_value(d)?,
            Self::Cash => serde_json::Value::Object(serde_json::Map::new()),
        };
        Ok((self.kind(), value))
    }
}

/// A configured payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    /// Stable identifier, e.g. `cmi` or `cod`.
    pub code: String,
    pub name: String,
    pub config: PaymentMethodConfig,
    pub enabled: bool,
    /// Percent of the pre-fee amount.
    pub fee_percentage: Decimal,
    pub fee_fixed: Decimal,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub currencies: Vec<CurrencyCode>,
    /// Human label such as "1-2 business days".
    pub processing_time: Option<String>,
    pub sort_order: i32,
}

impl PaymentMethod {
    #[must_use]
    pub const fn kind(&self) -> PaymentMethodKind {
        self.config.kind()
    }

    #[must_use]
    pub fn supports_currency(&self, currency: CurrencyCode) -> bool {
        self.currencies.contains(&currency)
    }

    /// Whether `amount` lies within `[min_amount, max_amount]`.
    #[must_use]
    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        self.min_amount.is_none_or(|min| amount >= min)
            && self.max_amount.is_none_or(|max| amount <= max)
    }
}

/// Data for creating or updating a payment method, keyed by code.
///
/// `config` is checked against `kind` before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub fee_percentage: Decimal,
    #[serde(default)]
    pub fee_fixed: Decimal,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencyCode>,
    #[serde(default)]
    pub processing_time: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

const fn default_enabled() -> bool {
    true
}

fn default_currencies() -> Vec<CurrencyCode> {
    vec![CurrencyCode::MAD]
}

impl NewPaymentMethod {
    /// The typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not fit `kind`.
    pub fn typed_config(&self) -> Result<PaymentMethodConfig, serde_json::Error> {
        PaymentMethodConfig::from_parts(self.kind, self.config.clone())
    }
}

/// What customers see of a payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMethodView {
    pub id: PaymentMethodId,
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub processing_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<BankDetails>,
}

impl From<&PaymentMethod> for PaymentMethodView {
    fn from(method: &PaymentMethod) -> Self {
        let bank_details = match &method.config {
            PaymentMethodConfig::BankTransfer(details) => Some(details.clone()),
            _ => None,
        };
        Self {
            id: method.id,
            code: method.code.clone(),
            name: method.name.clone(),
            kind: method.kind(),
            processing_time: method.processing_time.clone(),
            bank_details,
        }
    }
}
