//! HMAC-SHA256 signatures for payment gateway callbacks.
//!
//! The gateway signs `v1:{timestamp}:{body}` with the shared callback secret
//! and sends the result as `v1=<hex>` in [`SIGNATURE_HEADER`], with the unix
//! timestamp in [`TIMESTAMP_HEADER`].

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

pub const SIGNATURE_HEADER: &str = "x-souk-signature";
pub const TIMESTAMP_HEADER: &str = "x-souk-timestamp";

/// Callbacks older (or further in the future) than this are rejected.
const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("request timestamp outside the replay window")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,

    #[error("invalid signing key")]
    Key,
}

/// Signs and verifies callback payloads.
#[derive(Clone)]
pub struct CallbackVerifier {
    secret: SecretString,
}

impl CallbackVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Signature header value for `body` sent at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::Key` if the secret cannot key the MAC.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Key)?;
        mac.update(format!("v1:{timestamp}:").as_bytes());
        mac.update(body);
        Ok(format!("v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Verify a callback against the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, body, signature, chrono::Utc::now().timestamp())
    }

    /// Verify a callback as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` if the timestamp does not parse, `Expired`
    /// outside the replay window, `Mismatch` if the signature is wrong.
    pub fn verify_at(
        &self,
        timestamp: &str,
        body: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        if (now - ts).abs() > REPLAY_WINDOW_SECS {
            return Err(SignatureError::Expired);
        }

        let expected = self.sign(ts, body)?;
        if !constant_time_compare(&expected, signature.trim()) {
            return Err(SignatureError::Mismatch);
        }

        debug!("Payment callback signature verified");
        Ok(())
    }
}

impl std::fmt::Debug for CallbackVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
