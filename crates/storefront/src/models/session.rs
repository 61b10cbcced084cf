//! Session-related types.

use serde::{Deserialize, Serialize};

use souk_core::{CustomerId, Email};

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the signed-in customer,
/// including guests provisioned during checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Customer's database ID.
    pub id: CustomerId,
    /// Customer's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";
}
