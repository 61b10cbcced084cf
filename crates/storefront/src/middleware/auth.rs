//! Authentication extractors.
//!
//! Customers are identified by the session (set at sign-in or after a guest
//! checkout). Back-office endpoints take a static bearer token.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentCustomer, session_keys};
use crate::services::signature::constant_time_compare;
use crate::state::AppState;

/// Extractor that optionally gets the current customer.
///
/// Never rejects: without a session layer or a signed-in customer both
/// fields are `None`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(customer: OptionalCustomer) -> impl IntoResponse {
///     match customer.current() {
///         Some(c) => format!("Hello, {}!", c.email),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalCustomer {
    session: Option<Session>,
    customer: Option<CurrentCustomer>,
}

impl OptionalCustomer {
    #[must_use]
    pub const fn current(&self) -> Option<&CurrentCustomer> {
        self.customer.as_ref()
    }

    #[must_use]
    pub fn into_current(self) -> Option<CurrentCustomer> {
        self.customer
    }

    /// Remember `customer` in the session so later checkouts reuse the
    /// account. Does nothing without a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn remember(
        &self,
        customer: &CurrentCustomer,
    ) -> Result<(), tower_sessions::session::Error> {
        if let Some(session) = &self.session {
            set_current_customer(session, customer).await?;
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().cloned();
        let customer = match &session {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        if let Some(customer) = &customer {
            tracing::Span::current().record("customer_id", customer.id.as_i64());
        }

        Ok(Self { session, customer })
    }
}

/// Extractor guarding back-office routes with `Authorization: Bearer <token>`.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        if !constant_time_compare(presented.trim(), state.config().admin_token.expose_secret()) {
            tracing::warn!("Rejected admin request with a wrong token");
            return Err(AppError::Unauthorized("invalid token".to_string()));
        }
        Ok(Self)
    }
}

/// Helper to set the current customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await?;
    set_sentry_user(&customer.id, Some(customer.email.as_str()));
    Ok(())
}
