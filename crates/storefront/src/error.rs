//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON: `{"error": <reason code>, "message": ..., "retryable": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::{CheckoutError, ErrorCategory};
use crate::db::RepositoryError;
use crate::services::SignatureError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout engine rejected or failed the request.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment callback signature was missing or wrong.
    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    retryable: bool,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => checkout_status(err),
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Signature(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn reason_code(&self) -> &'static str {
        match self {
            Self::Checkout(err) => err.reason_code(),
            Self::Database(_) | Self::Internal(_) => "internal_error",
            Self::Signature(_) => "invalid_signature",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::RateLimited => "rate_limited",
        }
    }

    /// Whether the error is ours rather than the caller's.
    const fn is_server_side(&self) -> bool {
        match self {
            Self::Checkout(err) => matches!(
                err.category(),
                ErrorCategory::Invariant | ErrorCategory::Internal
            ),
            Self::Database(_) | Self::Internal(_) => true,
            _ => false,
        }
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
        CheckoutError::AccountExists(_) => StatusCode::CONFLICT,
        CheckoutError::CommitTimeout => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::NegativeTotal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => match err.category() {
            ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Contention | ErrorCategory::Invariant => StatusCode::CONFLICT,
            ErrorCategory::Downstream => StatusCode::BAD_GATEWAY,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors and broken invariants to Sentry
        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                reason = self.reason_code(),
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, reason = self.reason_code(), "Request rejected");
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Checkout(CheckoutError::Storage(_) | CheckoutError::CredentialHash) => {
                "Internal server error".to_string()
            }
            Self::Checkout(err) if err.is_retryable() => {
                format!("{err}, please try again")
            }
            Self::Checkout(err) => err.to_string(),
            Self::Signature(_) => "Invalid signature".to_string(),
            _ => self.to_string(),
        };
        let retryable = matches!(&self, Self::Checkout(err) if err.is_retryable());

        let body = ErrorBody {
            error: self.reason_code(),
            message,
            retryable,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Call this once a customer is attached to the session to associate errors
/// with them.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for customer actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_code", "ORD-20260118-7KX2QF")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
