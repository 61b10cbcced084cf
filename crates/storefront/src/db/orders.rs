//! Order repository (read side and notes).
//!
//! Orders are created and their statuses changed only through
//! [`super::PgCheckoutStore`], which wraps each write in a transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

use souk_core::{
    CouponCode, CouponId, CurrencyCode, CustomerId, Email, OrderId, OrderItemId, OrderStatus,
    PaymentMethodId, PaymentStatus, ProductId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderTotals, ShippingAddress};

pub(crate) const ORDER_COLUMNS: &str = "id, code, customer_id, currency, subtotal, shipping, \
     discount, payment_fee, tax, total, ship_name, ship_phone, ship_email, ship_address, \
     ship_city, ship_region, ship_postal_code, payment_method_id, payment_method_code, \
     coupon_id, coupon_code, status, payment_status, notes, created_at, updated_at, \
     shipped_at, delivered_at, cancelled_at";

#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    id: i64,
    code: String,
    customer_id: Option<i64>,
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
    payment_fee: Decimal,
    tax: Decimal,
    total: Decimal,
    ship_name: String,
    ship_phone: String,
    ship_email: String,
    ship_address: String,
    ship_city: String,
    ship_region: Option<String>,
    ship_postal_code: Option<String>,
    payment_method_id: i64,
    payment_method_code: String,
    coupon_id: Option<i64>,
    coupon_code: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: i64,
    product_id: Option<i64>,
    name: String,
    sku: String,
    price: Decimal,
    quantity: i32,
    total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            name: row.name,
            sku: row.sku,
            price: row.price,
            quantity: row.quantity,
            total: row.total,
        }
    }
}

impl OrderRow {
    pub(crate) const fn id(&self) -> i64 {
        self.id
    }

    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let email = Email::parse(&self.ship_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {} has invalid email: {e}", self.code))
        })?;
        let coupon_code = self
            .coupon_code
            .as_deref()
            .map(CouponCode::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!(
                    "order {} has invalid coupon code: {e}",
                    self.code
                ))
            })?;

        Ok(Order {
            id: OrderId::new(self.id),
            code: self.code,
            customer_id: self.customer_id.map(CustomerId::new),
            items,
            totals: OrderTotals {
                currency: self.currency,
                subtotal: self.subtotal,
                shipping: self.shipping,
                discount: self.discount,
                payment_fee: self.payment_fee,
                tax: self.tax,
                total: self.total,
            },
            address: ShippingAddress {
                name: self.ship_name,
                phone: self.ship_phone,
                email,
                address: self.ship_address,
                city: self.ship_city,
                region: self.ship_region,
                postal_code: self.ship_postal_code,
            },
            payment_method_id: PaymentMethodId::new(self.payment_method_id),
            payment_method_code: self.payment_method_code,
            coupon_id: self.coupon_id.map(CouponId::new),
            coupon_code,
            status: self.status,
            payment_status: self.payment_status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

/// Load the items of `row` and assemble the order. Works on a pool
/// connection or inside a transaction.
pub(crate) async fn hydrate(
    conn: &mut PgConnection,
    row: OrderRow,
) -> Result<Order, RepositoryError> {
    let items: Vec<OrderItemRow> = sqlx::query_as(
        r"
        SELECT id, product_id, name, sku, price, quantity, total
        FROM storefront.order_item
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_order(items.into_iter().map(OrderItem::from).collect())
}

/// Repository for placed orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => hydrate(&mut conn, row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Get an order by its public code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE code = $1"#
        ))
        .bind(code.trim().to_uppercase())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => hydrate(&mut conn, row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Append a line to the order notes, whatever the status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn append_notes(&self, id: OrderId, notes: &str) -> Result<Order, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE storefront."order"
            SET notes = CASE
                    WHEN COALESCE(RTRIM(notes), '') = '' THEN $2
                    ELSE RTRIM(notes) || E'\n' || $2
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(notes.trim())
        .fetch_optional(&mut *conn)
        .await?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        hydrate(&mut conn, row).await
    }
}
