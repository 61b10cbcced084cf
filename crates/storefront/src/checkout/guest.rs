//! Guest account provisioning.
//!
//! Buyers without a session get a customer account created on the fly. The
//! account is keyed by email, so retrying a failed checkout reuses it instead
//! of creating a second one.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use souk_core::Email;

use super::error::CheckoutError;
use super::store::{CheckoutStore, StoreError};
use crate::models::{Customer, NewCustomer};

/// Random bytes in a temporary credential.
const CREDENTIAL_BYTES: usize = 18;

/// Contact details supplied by an unauthenticated buyer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Email a guest account is keyed on.
///
/// The supplied address if there is one, otherwise a placeholder derived
/// from the phone digits, otherwise a random one.
///
/// # Errors
///
/// Returns `CheckoutError::InvalidEmail` if the supplied address is invalid.
pub fn guest_email(contact: &GuestContact, domain: &str) -> Result<Email, CheckoutError> {
    if let Some(email) = contact.email.as_deref().filter(|e| !e.trim().is_empty()) {
        return Ok(Email::parse(email)?);
    }

    let digits: String = contact
        .phone
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    let local = if digits.is_empty() {
        format!("guest-{}", uuid::Uuid::new_v4().simple())
    } else {
        format!("guest-{digits}")
    };
    Ok(Email::parse(&format!("{local}@{domain}"))?)
}

/// A freshly generated temporary password and its argon2 hash.
pub struct TemporaryCredential {
    secret: SecretString,
    hash: String,
}

impl TemporaryCredential {
    /// Generate and hash a new credential.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CredentialHash` if hashing fails.
    pub fn generate() -> Result<Self, CheckoutError> {
        let mut bytes = [0u8; CREDENTIAL_BYTES];
        rand::rng().fill(&mut bytes);
        let secret = URL_SAFE_NO_PAD.encode(bytes);

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| CheckoutError::CredentialHash)?;

        Ok(Self {
            secret: SecretString::from(secret),
            hash,
        })
    }

    /// The plaintext credential, for delivery to the buyer.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    /// PHC-format hash to store.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Result of provisioning.
#[derive(Debug)]
pub struct ProvisionedGuest {
    pub customer: Customer,
    /// Set when the account was created by this call. Reused accounts get a
    /// rotated credential only once an order succeeds.
    pub credential: Option<TemporaryCredential>,
}

/// Find or create the guest account for `contact`.
///
/// # Errors
///
/// Returns `AccountExists` if the email belongs to a registered account,
/// `InvalidEmail` for a bad address, and storage errors.
pub async fn provision_guest(
    store: &dyn CheckoutStore,
    contact: &GuestContact,
    domain: &str,
) -> Result<ProvisionedGuest, CheckoutError> {
    let email = guest_email(contact, domain)?;

    if let Some(existing) = store.customer_by_email(&email).await? {
        return reuse(existing);
    }

    let credential = TemporaryCredential::generate()?;
    let new = NewCustomer {
        email: email.clone(),
        name: contact.name.trim().to_owned(),
        phone: contact
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned),
        is_guest: true,
        password_hash: credential.hash().to_owned(),
    };

    match store.insert_customer(new).await {
        Ok(customer) => {
            info!(customer_id = %customer.id, "Guest account created");
            Ok(ProvisionedGuest {
                customer,
                credential: Some(credential),
            })
        }
        Err(StoreError::EmailTaken(_)) => {
            debug!(%email, "Lost guest insert race, reusing winner");
            let winner = store
                .customer_by_email(&email)
                .await?
                .ok_or_else(|| CheckoutError::AccountExists(email.clone()))?;
            reuse(winner)
        }
        Err(e) => Err(e.into()),
    }
}

fn reuse(customer: Customer) -> Result<ProvisionedGuest, CheckoutError> {
    if !customer.is_guest {
        return Err(CheckoutError::AccountExists(customer.email));
    }
    Ok(ProvisionedGuest {
        customer,
        credential: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use argon2::{PasswordHash, PasswordVerifier};

    use super::*;
    use crate::checkout::memory::MemoryCheckoutStore;

    const DOMAIN: &str = "guest.invalid";

    fn contact(email: Option<&str>, phone: Option<&str>) -> GuestContact {
        GuestContact {
            name: "Salma".to_owned(),
            email: email.map(str::to_owned),
            phone: phone.map(str::to_owned),
        }
    }

    #[test]
    fn test_supplied_email_is_normalized() {
        let email = guest_email(&contact(Some(" Salma@Example.MA "), None), DOMAIN).unwrap();
        assert_eq!(email.as_str(), "salma@example.ma");
    }

    #[test]
    fn test_placeholder_from_phone_is_deterministic() {
        let a = guest_email(&contact(None, Some("+212 6-11-22-33-44")), DOMAIN).unwrap();
        let b = guest_email(&contact(Some("  "), Some("212611223344")), DOMAIN).unwrap();
        assert_eq!(a.as_str(), "guest-212611223344@guest.invalid");
        assert_eq!(a, b);
    }

    #[test]
    fn test_placeholder_without_contact_is_random() {
        let a = guest_email(&contact(None, None), DOMAIN).unwrap();
        let b = guest_email(&contact(None, Some("n/a")), DOMAIN).unwrap();
        assert!(a.as_str().starts_with("guest-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_email_rejected() {
        assert!(matches!(
            guest_email(&contact(Some("not-an-email"), None), DOMAIN),
            Err(CheckoutError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_credential_hash_verifies() {
        let credential = TemporaryCredential::generate().unwrap();
        assert_eq!(credential.expose().len(), 24);
        let parsed = PasswordHash::new(credential.hash()).unwrap();
        assert!(
            Argon2::default()
                .verify_password(credential.expose().as_bytes(), &parsed)
                .is_ok()
        );
        assert!(!format!("{credential:?}").contains(credential.expose()));
    }

    #[tokio::test]
    async fn test_second_provision_reuses_account() {
        let store = MemoryCheckoutStore::new();
        let guest = contact(Some("salma@example.ma"), None);

        let first = provision_guest(&store, &guest, DOMAIN).await.unwrap();
        assert!(first.credential.is_some());
        assert!(first.customer.is_guest);

        let second = provision_guest(&store, &guest, DOMAIN).await.unwrap();
        assert_eq!(second.customer.id, first.customer.id);
        assert!(second.credential.is_none());
        assert_eq!(store.customer_count(), 1);
    }

    #[tokio::test]
    async fn test_registered_account_is_not_reused() {
        let store = MemoryCheckoutStore::new();
        store
            .insert_customer(NewCustomer {
                email: Email::parse("member@example.ma").unwrap(),
                name: "Member".to_owned(),
                phone: None,
                is_guest: false,
                password_hash: "x".to_owned(),
            })
            .await
            .unwrap();

        let err = provision_guest(&store, &contact(Some("MEMBER@example.ma"), None), DOMAIN)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::AccountExists(_)));
        assert_eq!(err.reason_code(), "account_exists");
    }
}
