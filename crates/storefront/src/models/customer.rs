//! Customer accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souk_core::{CustomerId, Email};

/// A customer account, registered or provisioned as a guest at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    /// Created transparently during checkout rather than by sign-up.
    pub is_guest: bool,
    /// Whether the temporary credential of a guest account has been sent.
    pub credential_delivered: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for inserting a customer.
#[derive(Clone)]
pub struct NewCustomer {
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub is_guest: bool,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for NewCustomer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewCustomer")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("is_guest", &self.is_guest)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}
