//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STOREFRONT_ADMIN_TOKEN` - Bearer token for the back-office endpoints
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CHECKOUT_DEFAULT_CURRENCY` - Cart currency when none is given (default: MAD)
//! - `CHECKOUT_COMMIT_TIMEOUT_MS` - Upper bound on an order commit (default: 5000)
//! - `CHECKOUT_GUEST_EMAIL_DOMAIN` - Domain of synthesized guest emails (default: guest.invalid)
//! - `NOTIFY_WEBHOOK_URL` - Notification webhook; notifications are only logged without it
//! - `PAYMENT_GATEWAY_URL` - Payment gateway API base URL
//! - `PAYMENT_GATEWAY_API_KEY` - Payment gateway API key (required with the URL)
//! - `PAYMENT_CALLBACK_SECRET` - HMAC secret of gateway callbacks; callbacks are refused without it
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use souk_core::CurrencyCode;

use crate::checkout::CheckoutOptions;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_GUEST_EMAIL_DOMAIN: &str = "guest.invalid";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Bearer token guarding `/admin`
    pub admin_token: SecretString,
    pub checkout: CheckoutConfig,
    pub payments: PaymentConfig,
    /// Webhook receiving notifications
    pub notify_webhook_url: Option<Url>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Checkout engine tuning.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub default_currency: CurrencyCode,
    pub commit_timeout: Duration,
    pub guest_email_domain: String,
}

/// Payment gateway access and callback verification.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone, Default)]
pub struct PaymentConfig {
    /// Gateway API base URL
    pub gateway_url: Option<Url>,
    /// Gateway API key, present whenever `gateway_url` is
    pub gateway_api_key: Option<SecretString>,
    /// HMAC secret shared with the gateway for callbacks
    pub callback_secret: Option<SecretString>,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PaymentConfig")
            .field("gateway_url", &self.gateway_url.as_ref().map(Url::as_str))
            .field("gateway_api_key", &redact(&self.gateway_api_key))
            .field("callback_secret", &redact(&self.callback_secret))
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let base_url = parse_url("STOREFRONT_BASE_URL", &base_url)?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;
        let admin_token = get_validated_secret("STOREFRONT_ADMIN_TOKEN")?;

        let checkout = CheckoutConfig::from_env()?;
        let payments = PaymentConfig::from_env()?;
        let notify_webhook_url = get_optional_env("NOTIFY_WEBHOOK_URL")
            .map(|v| parse_url("NOTIFY_WEBHOOK_URL", &v))
            .transpose()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            admin_token,
            checkout,
            payments,
            notify_webhook_url,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Options for the checkout service. Customers return to
    /// `{base_url}/orders/` after paying.
    #[must_use]
    pub fn checkout_options(&self) -> CheckoutOptions {
        CheckoutOptions {
            default_currency: self.checkout.default_currency,
            commit_timeout: self.checkout.commit_timeout,
            guest_email_domain: self.checkout.guest_email_domain.clone(),
            payment_return_url: self.base_url.join("orders/").ok(),
        }
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_currency = get_env_or_default("CHECKOUT_DEFAULT_CURRENCY", "MAD")
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHECKOUT_DEFAULT_CURRENCY".to_string(), e.to_string())
            })?;
        let timeout_ms = get_env_or_default(
            "CHECKOUT_COMMIT_TIMEOUT_MS",
            &DEFAULT_COMMIT_TIMEOUT_MS.to_string(),
        )
        .parse::<u64>()
        .ok()
        .filter(|&ms| ms > 0)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "CHECKOUT_COMMIT_TIMEOUT_MS".to_string(),
                "must be a positive number of milliseconds".to_string(),
            )
        })?;
        let guest_email_domain =
            get_env_or_default("CHECKOUT_GUEST_EMAIL_DOMAIN", DEFAULT_GUEST_EMAIL_DOMAIN)
                .trim()
                .to_lowercase();
        if guest_email_domain.is_empty() || guest_email_domain.contains('@') {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_GUEST_EMAIL_DOMAIN".to_string(),
                "must be a bare domain".to_string(),
            ));
        }

        Ok(Self {
            default_currency,
            commit_timeout: Duration::from_millis(timeout_ms),
            guest_email_domain,
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let gateway_url = get_optional_env("PAYMENT_GATEWAY_URL")
            .map(|v| parse_url("PAYMENT_GATEWAY_URL", &v))
            .transpose()?;
        let gateway_api_key = match gateway_url {
            Some(_) => Some(get_validated_secret("PAYMENT_GATEWAY_API_KEY")?),
            None => None,
        };
        let callback_secret = get_optional_env("PAYMENT_CALLBACK_SECRET")
            .map(|value| -> Result<SecretString, ConfigError> {
                validate_secret_strength(&value, "PAYMENT_CALLBACK_SECRET")?;
                Ok(SecretString::from(value))
            })
            .transpose()?;

        Ok(Self {
            gateway_url,
            gateway_api_key,
            callback_secret,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an absolute URL, making sure it ends with `/` so relative joins
/// append instead of replacing the last segment.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let value = value.trim();
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_ok());
    }

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: parse_url("TEST", "https://souk.ma").unwrap(),
            session_secret: SecretString::from("x".repeat(32)),
            admin_token: SecretString::from("admin_token_value"),
            checkout: CheckoutConfig {
                default_currency: CurrencyCode::MAD,
                commit_timeout: Duration::from_millis(DEFAULT_COMMIT_TIMEOUT_MS),
                guest_email_domain: DEFAULT_GUEST_EMAIL_DOMAIN.to_string(),
            },
            payments: PaymentConfig::default(),
            notify_webhook_url: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_parse_url_appends_slash() {
        let url = parse_url("TEST", "https://pay.example.ma/api/v2").unwrap();
        assert_eq!(url.as_str(), "https://pay.example.ma/api/v2/");
        assert_eq!(
            url.join("charges").unwrap().as_str(),
            "https://pay.example.ma/api/v2/charges"
        );
        assert!(parse_url("TEST", "not a url").is_err());
    }

    #[test]
    fn test_checkout_options_return_url() {
        let options = config().checkout_options();
        assert_eq!(options.default_currency, CurrencyCode::MAD);
        assert_eq!(options.commit_timeout, Duration::from_secs(5));
        assert_eq!(
            options.payment_return_url.unwrap().as_str(),
            "https://souk.ma/orders/"
        );
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let config = PaymentConfig {
            gateway_url: Some(parse_url("TEST", "https://pay.souk.ma").unwrap()),
            gateway_api_key: Some(SecretString::from("gw_key_4f9Kq2")),
            callback_secret: Some(SecretString::from("cb_secret_8Zx1")),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("pay.souk.ma"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("gw_key_4f9Kq2"));
        assert!(!debug_output.contains("cb_secret_8Zx1"));
    }
}
