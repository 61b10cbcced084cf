//! Payment method toggles.
//!
//! # Usage
//!
//! ```bash
//! souk-cli payment-method disable cod
//! souk-cli payment-method enable cod
//! ```

use souk_storefront::db::PaymentMethodRepository;

use super::{CommandError, connect};

/// Enable or disable a payment method by code.
///
/// # Errors
///
/// Returns `NotFound` if no payment method has this code.
pub async fn set_enabled(code: &str, enabled: bool) -> Result<(), CommandError> {
    let code = code.trim();
    let pool = connect().await?;

    if !PaymentMethodRepository::new(&pool)
        .set_enabled(code, enabled)
        .await?
    {
        return Err(CommandError::NotFound("payment method", code.to_string()));
    }

    tracing::info!(code, enabled, "Payment method updated");
    Ok(())
}
