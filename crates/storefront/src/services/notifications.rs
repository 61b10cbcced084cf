//! Customer notifications.
//!
//! Delivery is best-effort: [`dispatch`] hands the notification to a spawned
//! task and returns immediately, and failures are only logged. A checkout
//! never fails because an email could not be sent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use souk_core::{CurrencyCode, Email, OrderStatus, PaymentStatus};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected notification with status {status}")]
    Rejected { status: u16 },
}

/// A temporary password on its way to the customer.
#[derive(Clone)]
pub struct DeliveredCredential(SecretString);

impl DeliveredCredential {
    #[must_use]
    pub fn new(credential: &str) -> Self {
        Self(SecretString::from(credential.to_owned()))
    }
}

impl std::fmt::Debug for DeliveredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for DeliveredCredential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.expose_secret())
    }
}

/// Events sent to customers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    OrderPlaced {
        order_code: String,
        email: Email,
        total: Decimal,
        currency: CurrencyCode,
    },
    StatusChanged {
        order_code: String,
        email: Email,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentUpdated {
        order_code: String,
        email: Email,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    GuestAccountCreated {
        email: Email,
        temporary_password: DeliveredCredential,
    },
}

impl Notification {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order_placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::PaymentUpdated { .. } => "payment_updated",
            Self::GuestAccountCreated { .. } => "guest_account_created",
        }
    }

    #[must_use]
    pub const fn recipient(&self) -> &Email {
        match self {
            Self::OrderPlaced { email, .. }
            | Self::StatusChanged { email, .. }
            | Self::PaymentUpdated { email, .. }
            | Self::GuestAccountCreated { email, .. } => email,
        }
    }
}

/// Something that can deliver a [`Notification`].
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns a `NotifyError` if delivery fails.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            event = notification.kind(),
            recipient = %notification.recipient(),
            "Notification"
        );
        Ok(())
    }
}

/// Posts notifications as JSON to a webhook (mailer, CRM, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: Url) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Deliver `notification` on a background task.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                event = notification.kind(),
                reason = "notification_failed",
                error = %e,
                "Failed to deliver notification"
            );
        }
    });
}
