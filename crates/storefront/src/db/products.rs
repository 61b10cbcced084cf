//! Product repository.
//!
//! Checkout only reads products; stock updates happen inside the order
//! commit in [`super::store`].

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use souk_core::{CurrencyCode, ProductId};

use super::RepositoryError;
use crate::models::{NewProduct, Product};

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub quantity: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            sku: row.sku,
            price: row.price,
            currency: row.currency,
            quantity: row.quantity,
        }
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Products with the given ids. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, sku, price, currency, quantity
            FROM storefront.product
            WHERE id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Create a product, or update the one with the same sku.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(
            r"
            INSERT INTO storefront.product (name, sku, price, currency, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sku) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING id, name, sku, price, currency, quantity
            ",
        )
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price)
        .bind(product.currency)
        .bind(product.quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
