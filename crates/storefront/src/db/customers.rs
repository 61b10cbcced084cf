//! Customer repository.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use souk_core::{CustomerId, Email};

use super::RepositoryError;
use crate::models::{Customer, NewCustomer};

const CUSTOMER_COLUMNS: &str = "id, email, name, phone, is_guest, credential_delivered, created_at";

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: i64,
    email: String,
    name: String,
    phone: Option<String>,
    is_guest: bool,
    credential_delivered: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: CustomerId::new(row.id),
            email,
            name: row.name,
            phone: row.phone,
            is_guest: row.is_guest,
            credential_delivered: row.credential_delivered,
            created_at: row.created_at,
        })
    }
}

/// Repository for customer accounts.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM storefront.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Get a customer by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM storefront.customer WHERE LOWER(email) = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Create a customer. Registered accounts start with their credential
    /// delivered; guests do not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.customer
                (email, name, phone, is_guest, password_hash, credential_delivered)
            VALUES ($1, $2, $3, $4, $5, NOT $4)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(customer.phone.as_deref())
        .bind(customer.is_guest)
        .bind(&customer.password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "customer"))?;

        row.try_into()
    }

    /// Replace the password hash of a guest whose credential has not been
    /// delivered yet. Returns `false` if no such guest exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rotate_credential(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1 AND is_guest AND NOT credential_delivered
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that the temporary credential has been sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn mark_credential_delivered(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer
            SET credential_delivered = TRUE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
