//! `PostgreSQL` implementation of [`CheckoutStore`].
//!
//! Reads go through the repositories. Writes that race with other checkouts
//! run in a transaction made of conditional updates, so the row locks taken
//! by `UPDATE ... WHERE quantity >= $n` serialize competing orders without
//! any application-level locking.
//!
//! An order commit has a deadline. Everything up to the final `COMMIT` runs
//! under it, with `statement_timeout` set to the remaining budget so the
//! server gives up too. The `COMMIT` itself is never cancelled.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::time::Instant;

use souk_core::{
    CouponCode, CouponId, CustomerId, Email, OrderId, OrderStatus, PaymentStatus, ProductId,
};

use super::orders::{ORDER_COLUMNS, OrderRow, hydrate};
use super::{
    CouponRepository, CustomerRepository, OrderRepository, PaymentMethodRepository,
    ProductRepository, RepositoryError, SettingsRepository, ShippingRateRepository,
};
use crate::checkout::store::{CheckoutStore, PaymentChange, StatusChange, StoreError};
use crate::models::{
    CheckoutSettings, Coupon, Customer, NewCustomer, NewOrder, Order, PaymentMethod, Product,
    ShippingRate,
};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(RepositoryError::Database(err))
    }
}

/// Checkout storage backed by the `storefront` schema.
#[derive(Debug, Clone)]
pub struct PgCheckoutStore {
    pool: PgPool,
}

impl PgCheckoutStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run every write of an order commit and return the open transaction.
    /// Dropping it rolls everything back.
    async fn stage_order(
        &self,
        new: &NewOrder,
        deadline: Instant,
    ) -> Result<(Transaction<'static, Postgres>, Order), StoreError> {
        let mut tx = self.pool.begin().await?;

        let budget = deadline.saturating_duration_since(Instant::now());
        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", budget.as_millis().max(1)))
            .execute(&mut *tx)
            .await?;

        for (product_id, quantity) in new.stock_reservations() {
            let reserved = sqlx::query(
                r"
                UPDATE storefront.product
                SET quantity = quantity - $2, updated_at = NOW()
                WHERE id = $1 AND quantity >= $2
                ",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                return Err(StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                });
            }
        }

        if let Some((coupon_id, code)) = &new.coupon {
            redeem_coupon(&mut tx, *coupon_id, code).await?;
        }

        let (coupon_id, coupon_code) = new
            .coupon
            .as_ref()
            .map_or((None, None), |(id, code)| (Some(*id), Some(code.as_str())));
        let totals = &new.totals;
        let address = &new.address;

        let inserted: Result<OrderRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO storefront."order"
                (code, customer_id, currency, subtotal, shipping, discount, payment_fee,
                 tax, total, ship_name, ship_phone, ship_email, ship_address, ship_city,
                 ship_region, ship_postal_code, payment_method_id, payment_method_code,
                 coupon_id, coupon_code, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&new.code)
        .bind(new.customer_id)
        .bind(totals.currency)
        .bind(totals.subtotal)
        .bind(totals.shipping)
        .bind(totals.discount)
        .bind(totals.payment_fee)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(&address.name)
        .bind(&address.phone)
        .bind(&address.email)
        .bind(&address.address)
        .bind(&address.city)
        .bind(address.region.as_deref())
        .bind(address.postal_code.as_deref())
        .bind(new.payment_method_id)
        .bind(&new.payment_method_code)
        .bind(coupon_id)
        .bind(coupon_code)
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateOrderCode),
            Err(e) => return Err(e.into()),
        };

        for item in &new.items {
            sqlx::query(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, name, sku, price, quantity, total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(row.id())
            .bind(item.product_id)
            .bind(&item.name)
            .bind(&item.sku)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.total)
            .execute(&mut *tx)
            .await?;
        }

        let order = hydrate(&mut tx, row).await?;
        Ok((tx, order))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// `query_canceled`, raised when `statement_timeout` fires.
fn is_statement_timeout(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Backend(RepositoryError::Database(sqlx::Error::Database(db_err)))
            if db_err.code().as_deref() == Some("57014")
    )
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore {
    async fn settings(&self) -> Result<CheckoutSettings, StoreError> {
        Ok(SettingsRepository::new(&self.pool).load().await?)
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(ProductRepository::new(&self.pool).get_many(ids).await?)
    }

    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, StoreError> {
        Ok(ShippingRateRepository::new(&self.pool).list().await?)
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        Ok(CouponRepository::new(&self.pool).get_by_code(code).await?)
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        Ok(PaymentMethodRepository::new(&self.pool).list().await?)
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepository::new(&self.pool).get_by_id(id).await?)
    }

    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepository::new(&self.pool)
            .get_by_email(email)
            .await?)
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        match CustomerRepository::new(&self.pool).create(&customer).await {
            Ok(created) => Ok(created),
            Err(RepositoryError::Conflict(_)) => Err(StoreError::EmailTaken(customer.email)),
            Err(e) => Err(e.into()),
        }
    }

    async fn rotate_credential(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        CustomerRepository::new(&self.pool)
            .rotate_credential(id, password_hash)
            .await?;
        Ok(())
    }

    async fn mark_credential_delivered(&self, id: CustomerId) -> Result<(), StoreError> {
        match CustomerRepository::new(&self.pool)
            .mark_credential_delivered(id)
            .await
        {
            Err(RepositoryError::NotFound) => Err(StoreError::NotFound),
            other => Ok(other?),
        }
    }

    #[tracing::instrument(skip(self, new, deadline), fields(order_code = %new.code))]
    async fn commit_order(&self, new: NewOrder, deadline: Instant) -> Result<Order, StoreError> {
        let staged = tokio::time::timeout_at(deadline, self.stage_order(&new, deadline)).await;
        let (tx, order) = match staged {
            Err(_) => return Err(StoreError::CommitTimeout),
            Ok(Err(e)) if is_statement_timeout(&e) => return Err(StoreError::CommitTimeout),
            Ok(staged) => staged?,
        };

        tx.commit().await?;

        tracing::debug!(order_id = %order.id, "Order committed");
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(OrderRepository::new(&self.pool).get_by_id(id).await?)
    }

    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError> {
        Ok(OrderRepository::new(&self.pool).get_by_code(code).await?)
    }

    async fn apply_status_change(&self, change: &StatusChange) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let at = Some(change.at);
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE storefront."order"
            SET status = $2,
                updated_at = $3,
                shipped_at = COALESCE($4, shipped_at),
                delivered_at = COALESCE($5, delivered_at),
                cancelled_at = COALESCE($6, cancelled_at),
                notes = CASE
                    WHEN $7::text IS NULL THEN notes
                    WHEN COALESCE(RTRIM(notes), '') = '' THEN $7
                    ELSE RTRIM(notes) || E'\n' || $7
                END
            WHERE id = $1
              AND status = $8
              AND ($2 <> 'shipped' OR payment_status <> 'failed')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(change.order_id)
        .bind(change.to)
        .bind(change.at)
        .bind(at.filter(|_| change.to == OrderStatus::Shipped))
        .bind(at.filter(|_| change.to == OrderStatus::Delivered))
        .bind(at.filter(|_| change.to == OrderStatus::Cancelled))
        .bind(change.notes.as_deref().map(str::trim))
        .bind(change.from)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(status_change_refused(&mut tx, change).await);
        };

        let mut restock = change.restock.clone();
        restock.sort_by_key(|(id, _)| *id);
        for (product_id, quantity) in restock {
            sqlx::query(
                r"
                UPDATE storefront.product
                SET quantity = quantity + $2, updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(coupon_id) = change.release_coupon {
            sqlx::query(
                "UPDATE storefront.coupon SET used_count = GREATEST(used_count - 1, 0) WHERE id = $1",
            )
            .bind(coupon_id)
            .execute(&mut *tx)
            .await?;
        }

        let order = hydrate(&mut tx, row).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn apply_payment_change(&self, change: &PaymentChange) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE storefront."order"
            SET payment_status = $2, updated_at = $3
            WHERE id = $1
              AND payment_status = $4
              AND status NOT IN ('delivered', 'cancelled')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(change.order_id)
        .bind(change.to)
        .bind(change.at)
        .bind(change.from)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(missing_or_stale(&mut tx, change.order_id).await);
        };

        let order = hydrate(&mut tx, row).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn append_notes(&self, id: OrderId, notes: &str) -> Result<Order, StoreError> {
        match OrderRepository::new(&self.pool).append_notes(id, notes).await {
            Err(RepositoryError::NotFound) => Err(StoreError::NotFound),
            other => Ok(other?),
        }
    }
}

/// Count one redemption, or explain why the coupon can no longer be used.
async fn redeem_coupon(
    tx: &mut sqlx::PgConnection,
    coupon_id: CouponId,
    code: &CouponCode,
) -> Result<(), StoreError> {
    let redeemed = sqlx::query(
        r"
        UPDATE storefront.coupon
        SET used_count = used_count + 1
        WHERE id = $1
          AND active
          AND (starts_at IS NULL OR starts_at <= NOW())
          AND (expires_at IS NULL OR expires_at >= NOW())
          AND (usage_limit IS NULL OR used_count < usage_limit)
        ",
    )
    .bind(coupon_id)
    .execute(&mut *tx)
    .await?;

    if redeemed.rows_affected() > 0 {
        return Ok(());
    }

    let state: Option<(bool, bool)> = sqlx::query_as(
        r"
        SELECT active,
               (starts_at IS NULL OR starts_at <= NOW())
                   AND (expires_at IS NULL OR expires_at >= NOW())
        FROM storefront.coupon
        WHERE id = $1
        ",
    )
    .bind(coupon_id)
    .fetch_optional(&mut *tx)
    .await?;

    Err(match state {
        Some((true, false)) => StoreError::CouponExpired(code.clone()),
        Some((true, true)) => StoreError::CouponExhausted(code.clone()),
        _ => StoreError::CouponUnavailable(code.clone()),
    })
}

/// Why a guarded status update matched no row.
async fn status_change_refused(tx: &mut sqlx::PgConnection, change: &StatusChange) -> StoreError {
    let current = sqlx::query_as::<_, (OrderStatus, PaymentStatus)>(
        r#"SELECT status, payment_status FROM storefront."order" WHERE id = $1"#,
    )
    .bind(change.order_id)
    .fetch_optional(&mut *tx)
    .await;

    match current {
        Ok(None) => StoreError::NotFound,
        Ok(Some((status, PaymentStatus::Failed)))
            if status == change.from && change.to == OrderStatus::Shipped =>
        {
            StoreError::PaymentFailed
        }
        Ok(Some(_)) => StoreError::StaleStatus,
        Err(e) => e.into(),
    }
}

/// Why a guarded order update matched no row.
async fn missing_or_stale(tx: &mut sqlx::PgConnection, id: OrderId) -> StoreError {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS (SELECT 1 FROM storefront."order" WHERE id = $1)"#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await;

    match exists {
        Ok(true) => StoreError::StaleStatus,
        Ok(false) => StoreError::NotFound,
        Err(e) => e.into(),
    }
}
