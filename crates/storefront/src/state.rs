//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::checkout::{CheckoutService, CheckoutStore};
use crate::config::StorefrontConfig;
use crate::db::PgCheckoutStore;
use crate::services::{
    CallbackVerifier, GatewayError, HttpGateway, LogNotifier, Notifier, NotifyError,
    OfflineGateway, PaymentGateway, WebhookNotifier,
};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("notifier: {0}")]
    Notifier(#[from] NotifyError),
    #[error("payment gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("PAYMENT_GATEWAY_URL is set without PAYMENT_GATEWAY_API_KEY")]
    MissingGatewayKey,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the checkout service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    checkout: CheckoutService,
    callbacks: Option<CallbackVerifier>,
}

impl AppState {
    /// Create the production state: Postgres storage, and the notifier and
    /// payment gateway selected by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the gateway URL
    /// comes without an API key.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
            None => Arc::new(LogNotifier),
        };
        let gateway: Arc<dyn PaymentGateway> = match (
            &config.payments.gateway_url,
            &config.payments.gateway_api_key,
        ) {
            (Some(url), Some(key)) => Arc::new(HttpGateway::new(url, key)?),
            (Some(_), None) => return Err(StateError::MissingGatewayKey),
            (None, _) => Arc::new(OfflineGateway),
        };
        let store: Arc<dyn CheckoutStore> = Arc::new(PgCheckoutStore::new(pool.clone()));
        let checkout = CheckoutService::new(store, notifier, gateway, config.checkout_options());

        Ok(Self::from_parts(config, Some(pool), checkout))
    }

    /// Assemble a state from an already built checkout service.
    ///
    /// Without a pool the readiness probe always passes.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        checkout: CheckoutService,
    ) -> Self {
        let callbacks = config
            .payments
            .callback_secret
            .clone()
            .map(CallbackVerifier::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                checkout,
                callbacks,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Verifier for payment callbacks. `None` when no secret is configured,
    /// in which case callbacks are refused.
    #[must_use]
    pub fn callbacks(&self) -> Option<&CallbackVerifier> {
        self.inner.callbacks.as_ref()
    }
}
