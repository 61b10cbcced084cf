//! Payment gateway client.
//!
//! The checkout engine only needs one capability from a gateway: create a
//! charge and get back a URL to send the buyer to. The outcome arrives later
//! as a signed callback (see [`super::signature`]).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use souk_core::CurrencyCode;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected charge: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("no payment gateway configured")]
    NotConfigured,
}

/// A charge to create for a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub order_code: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    /// Code of the gateway or wallet method the buyer picked.
    pub method: String,
    pub provider: String,
    pub return_url: Option<Url>,
}

/// Gateway answer to a charge request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeIntent {
    pub payment_url: Url,
    pub reference: String,
}

/// Charge capability of a payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge intent.
    ///
    /// # Errors
    ///
    /// Returns a `GatewayError` if the gateway is unreachable or refuses.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, GatewayError>;
}

/// Gateway reached over HTTP with a bearer API key.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    charges_url: Url,
}

impl HttpGateway {
    /// Create a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL or API key is unusable or the HTTP client
    /// fails to build.
    pub fn new(base_url: &Url, api_key: &SecretString) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| GatewayError::InvalidResponse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(GATEWAY_TIMEOUT)
            .build()?;

        let charges_url = base_url
            .join("charges")
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(Self {
            client,
            charges_url,
        })
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("charges_url", &self.charges_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    #[instrument(skip(self, request), fields(order_code = %request.order_code))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, GatewayError> {
        let response = self
            .client
            .post(self.charges_url.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent: ChargeIntent = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!(reference = %intent.reference, "Charge intent created");
        Ok(intent)
    }
}

/// Stand-in when no gateway is configured. Every charge fails, which leaves
/// orders pending with no payment URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeIntent, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_charges_url_joins_base() {
        let gateway = HttpGateway::new(
            &Url::parse("https://pay.example.ma/v1/").unwrap(),
            &SecretString::from("sk_test_51f0a9"),
        )
        .unwrap();
        assert_eq!(
            gateway.charges_url.as_str(),
            "https://pay.example.ma/v1/charges"
        );
        assert!(!format!("{gateway:?}").contains("sk_test"));
    }

    #[test]
    fn test_request_wire_format() {
        let request = ChargeRequest {
            order_code: "ORD-20260301-ABC123".to_owned(),
            amount: Decimal::new(40_050, 2),
            currency: CurrencyCode::MAD,
            method: "card".to_owned(),
            provider: "cmi".to_owned(),
            return_url: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "400.50");
        assert_eq!(json["currency"], "MAD");
    }

    #[tokio::test]
    async fn test_offline_gateway_refuses() {
        let request = ChargeRequest {
            order_code: "ORD-20260301-ABC123".to_owned(),
            amount: Decimal::TEN,
            currency: CurrencyCode::MAD,
            method: "card".to_owned(),
            provider: "cmi".to_owned(),
            return_url: None,
        };
        assert!(matches!(
            OfflineGateway.create_charge(&request).await,
            Err(GatewayError::NotConfigured)
        ));
    }
}
