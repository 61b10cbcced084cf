//! In-memory [`CheckoutStore`].
//!
//! Rows live in arenas (plain `Vec`s, id = index + 1) with hash indexes for
//! the unique keys. Every operation takes the one lock, checks its
//! preconditions and applies its writes before releasing it, which gives the
//! same all-or-nothing behavior as a database transaction with conditional
//! updates.
//!
//! Used by the test suites and for running the service without Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;

use souk_core::{
    CouponCode, CouponId, CustomerId, Email, OrderId, OrderItemId, OrderStatus, PaymentMethodId,
    PaymentStatus, ProductId, ShippingRateId,
};

use super::store::{CheckoutStore, PaymentChange, StatusChange, StoreError, join_notes};
use crate::db::RepositoryError;
use crate::models::{
    CheckoutSettings, Coupon, Customer, NewCoupon, NewCustomer, NewOrder, Order, OrderItem,
    PaymentMethod, Product, ShippingRate,
};

#[derive(Debug)]
struct StoredCustomer {
    customer: Customer,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Inner {
    settings: CheckoutSettings,
    products: Vec<Product>,
    /// Live products only. Removed products keep their arena slot.
    product_index: HashMap<ProductId, usize>,
    coupons: Vec<Coupon>,
    coupon_index: HashMap<CouponCode, usize>,
    shipping_rates: Vec<ShippingRate>,
    payment_methods: Vec<PaymentMethod>,
    customers: Vec<StoredCustomer>,
    customer_index: HashMap<Email, usize>,
    orders: Vec<Order>,
    order_index: HashMap<String, usize>,
    item_count: i64,
}

#[allow(clippy::cast_possible_wrap)]
const fn arena_id(index: usize) -> i64 {
    index as i64 + 1
}

fn arena_index(id: i64) -> Option<usize> {
    usize::try_from(id).ok()?.checked_sub(1)
}

impl Inner {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.product_index
            .get(&id)
            .and_then(|&i| self.products.get(i))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, StoreError> {
        arena_index(id.as_i64())
            .and_then(|i| self.orders.get_mut(i))
            .ok_or(StoreError::NotFound)
    }

    fn customer_mut(&mut self, id: CustomerId) -> Result<&mut StoredCustomer, StoreError> {
        arena_index(id.as_i64())
            .and_then(|i| self.customers.get_mut(i))
            .ok_or(StoreError::NotFound)
    }

    /// Check every precondition of a commit without writing anything.
    fn check_commit(&self, order: &NewOrder) -> Result<(), StoreError> {
        if self.order_index.contains_key(&order.code) {
            return Err(StoreError::DuplicateOrderCode);
        }

        for (product_id, requested) in order.stock_reservations() {
            let available = self.product(product_id).map_or(0, |p| p.quantity);
            if available < requested {
                return Err(StoreError::InsufficientStock {
                    product_id,
                    requested,
                });
            }
        }

        if let Some((coupon_id, code)) = &order.coupon {
            let coupon = arena_index(coupon_id.as_i64())
                .and_then(|i| self.coupons.get(i))
                .filter(|c| c.active)
                .ok_or_else(|| StoreError::CouponUnavailable(code.clone()))?;
            if !coupon.is_within_window(Utc::now()) {
                return Err(StoreError::CouponExpired(code.clone()));
            }
            if !coupon.has_remaining_uses() {
                return Err(StoreError::CouponExhausted(code.clone()));
            }
        }

        Ok(())
    }
}

/// Checkout store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryCheckoutStore {
    inner: Mutex<Inner>,
    commit_delay: Option<Duration>,
    ack_delay: Option<Duration>,
    code_collisions: AtomicU32,
}

impl MemoryCheckoutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit take at least `delay` before touching any data.
    #[must_use]
    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    /// Make every successful commit report back only `delay` after its
    /// writes are applied, like a slow `COMMIT` round trip.
    #[must_use]
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }

    /// Make the next `n` commits fail as if the order code were taken.
    pub fn inject_code_collisions(&self, n: u32) {
        self.code_collisions.store(n, Ordering::SeqCst);
    }

    pub fn set_settings(&self, settings: CheckoutSettings) {
        self.inner.lock().settings = settings;
    }

    /// Add a product; its id is assigned by the store.
    pub fn insert_product(&self, mut product: Product) -> ProductId {
        let mut inner = self.inner.lock();
        let index = inner.products.len();
        product.id = ProductId::new(arena_id(index));
        let id = product.id;
        inner.products.push(product);
        inner.product_index.insert(id, index);
        id
    }

    /// Remove a product from the catalog. Order items referencing it lose
    /// their product id, as with `ON DELETE SET NULL`.
    pub fn remove_product(&self, id: ProductId) {
        let mut inner = self.inner.lock();
        inner.product_index.remove(&id);
        for item in inner.orders.iter_mut().flat_map(|o| o.items.iter_mut()) {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
    }

    /// Add a coupon.
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` if the code is taken.
    pub fn insert_coupon(&self, coupon: NewCoupon) -> Result<CouponId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.coupon_index.contains_key(&coupon.code) {
            let message = format!("coupon {} already exists", coupon.code);
            return Err(RepositoryError::Conflict(message).into());
        }
        let index = inner.coupons.len();
        let id = CouponId::new(arena_id(index));
        inner.coupon_index.insert(coupon.code.clone(), index);
        inner.coupons.push(Coupon {
            id,
            code: coupon.code,
            discount_type: coupon.discount_type,
            value: coupon.value,
            minimum_amount: coupon.minimum_amount,
            maximum_discount: coupon.maximum_discount,
            usage_limit: coupon.usage_limit,
            used_count: 0,
            active: true,
            starts_at: coupon.starts_at,
            expires_at: coupon.expires_at,
            currency: coupon.currency,
        });
        Ok(id)
    }

    pub fn deactivate_coupon(&self, code: &CouponCode) {
        let mut inner = self.inner.lock();
        if let Some(coupon) = inner
            .coupon_index
            .get(code)
            .copied()
            .and_then(|i| inner.coupons.get_mut(i))
        {
            coupon.active = false;
        }
    }

    pub fn insert_shipping_rate(&self, mut rate: ShippingRate) -> ShippingRateId {
        let mut inner = self.inner.lock();
        rate.id = ShippingRateId::new(arena_id(inner.shipping_rates.len()));
        let id = rate.id;
        inner.shipping_rates.push(rate);
        id
    }

    pub fn insert_payment_method(&self, mut method: PaymentMethod) -> PaymentMethodId {
        let mut inner = self.inner.lock();
        method.id = PaymentMethodId::new(arena_id(inner.payment_methods.len()));
        let id = method.id;
        inner.payment_methods.push(method);
        id
    }

    pub fn set_payment_method_enabled(&self, id: PaymentMethodId, enabled: bool) {
        let mut inner = self.inner.lock();
        if let Some(method) = inner.payment_methods.iter_mut().find(|m| m.id == id) {
            method.enabled = enabled;
        }
    }

    /// Check and apply a commit under the lock.
    fn insert_order(&self, new: NewOrder) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock();
        inner.check_commit(&new)?;

        for (product_id, quantity) in new.stock_reservations() {
            if let Some(product) = inner
                .product_index
                .get(&product_id)
                .copied()
                .and_then(|i| inner.products.get_mut(i))
            {
                product.quantity -= quantity;
            }
        }
        if let Some(coupon) = new
            .coupon
            .as_ref()
            .and_then(|(id, _)| arena_index(id.as_i64()))
            .and_then(|i| inner.coupons.get_mut(i))
        {
            coupon.used_count += 1;
        }

        let now = Utc::now();
        let items = new
            .items
            .into_iter()
            .map(|item| {
                inner.item_count += 1;
                OrderItem {
                    id: OrderItemId::new(inner.item_count),
                    product_id: Some(item.product_id),
                    name: item.name,
                    sku: item.sku,
                    price: item.price,
                    quantity: item.quantity,
                    total: item.total,
                }
            })
            .collect();

        let index = inner.orders.len();
        let (coupon_id, coupon_code) = new
            .coupon
            .map_or((None, None), |(id, code)| (Some(id), Some(code)));
        let order = Order {
            id: OrderId::new(arena_id(index)),
            code: new.code,
            customer_id: new.customer_id,
            items,
            totals: new.totals,
            address: new.address,
            payment_method_id: new.payment_method_id,
            payment_method_code: new.payment_method_code,
            coupon_id,
            coupon_code,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            notes: new.notes,
            created_at: now,
            updated_at: now,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        inner.order_index.insert(order.code.clone(), index);
        inner.orders.push(order.clone());
        Ok(order)
    }

    #[must_use]
    pub fn product_quantity(&self, id: ProductId) -> Option<i32> {
        self.inner.lock().product(id).map(|p| p.quantity)
    }

    #[must_use]
    pub fn coupon_used_count(&self, code: &CouponCode) -> Option<i32> {
        let inner = self.inner.lock();
        inner
            .coupon_index
            .get(code)
            .and_then(|&i| inner.coupons.get(i))
            .map(|c| c.used_count)
    }

    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.inner.lock().customers.len()
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.inner.lock().orders.len()
    }

    /// Stored credential hash of a customer.
    #[must_use]
    pub fn password_hash(&self, email: &Email) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .customer_index
            .get(email)
            .and_then(|&i| inner.customers.get(i))
            .map(|c| c.password_hash.clone())
    }
}

#[async_trait]
impl CheckoutStore for MemoryCheckoutStore {
    async fn settings(&self) -> Result<CheckoutSettings, StoreError> {
        Ok(self.inner.lock().settings.clone())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|&id| inner.product(id).cloned())
            .collect())
    }

    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, StoreError> {
        Ok(self.inner.lock().shipping_rates.clone())
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .coupon_index
            .get(code)
            .and_then(|&i| inner.coupons.get(i))
            .cloned())
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        Ok(self.inner.lock().payment_methods.clone())
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let inner = self.inner.lock();
        Ok(arena_index(id.as_i64())
            .and_then(|i| inner.customers.get(i))
            .map(|c| c.customer.clone()))
    }

    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .customer_index
            .get(email)
            .and_then(|&i| inner.customers.get(i))
            .map(|c| c.customer.clone()))
    }

    async fn insert_customer(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        let mut inner = self.inner.lock();
        if inner.customer_index.contains_key(&new.email) {
            return Err(StoreError::EmailTaken(new.email));
        }
        let index = inner.customers.len();
        let customer = Customer {
            id: CustomerId::new(arena_id(index)),
            email: new.email.clone(),
            name: new.name,
            phone: new.phone,
            is_guest: new.is_guest,
            credential_delivered: !new.is_guest,
            created_at: Utc::now(),
        };
        inner.customer_index.insert(new.email, index);
        inner.customers.push(StoredCustomer {
            customer: customer.clone(),
            password_hash: new.password_hash,
        });
        Ok(customer)
    }

    async fn rotate_credential(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner.customer_mut(id)?;
        if stored.customer.is_guest && !stored.customer.credential_delivered {
            password_hash.clone_into(&mut stored.password_hash);
        }
        Ok(())
    }

    async fn mark_credential_delivered(&self, id: CustomerId) -> Result<(), StoreError> {
        self.inner.lock().customer_mut(id)?.customer.credential_delivered = true;
        Ok(())
    }

    async fn commit_order(&self, new: NewOrder, deadline: Instant) -> Result<Order, StoreError> {
        if let Some(delay) = self.commit_delay
            && tokio::time::timeout_at(deadline, tokio::time::sleep(delay))
                .await
                .is_err()
        {
            return Err(StoreError::CommitTimeout);
        }
        if Instant::now() >= deadline {
            return Err(StoreError::CommitTimeout);
        }

        if self
            .code_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::DuplicateOrderCode);
        }

        let order = self.insert_order(new)?;

        // Written already; only the acknowledgement is slow
        if let Some(delay) = self.ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock();
        Ok(arena_index(id.as_i64())
            .and_then(|i| inner.orders.get(i))
            .cloned())
    }

    async fn order_by_code(&self, code: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .order_index
            .get(code)
            .and_then(|&i| inner.orders.get(i))
            .cloned())
    }

    async fn apply_status_change(&self, change: &StatusChange) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.order_mut(change.order_id)?;
        if current.status != change.from {
            return Err(StoreError::StaleStatus);
        }
        if change.to == OrderStatus::Shipped && current.payment_status == PaymentStatus::Failed {
            return Err(StoreError::PaymentFailed);
        }

        for &(product_id, quantity) in &change.restock {
            if let Some(product) = inner
                .product_index
                .get(&product_id)
                .copied()
                .and_then(|i| inner.products.get_mut(i))
            {
                product.quantity += quantity;
            }
        }
        if let Some(coupon) = change
            .release_coupon
            .and_then(|id| arena_index(id.as_i64()))
            .and_then(|i| inner.coupons.get_mut(i))
        {
            coupon.used_count = (coupon.used_count - 1).max(0);
        }

        let order = inner.order_mut(change.order_id)?;
        order.status = change.to;
        order.updated_at = change.at;
        match change.to {
            OrderStatus::Shipped => order.shipped_at = Some(change.at),
            OrderStatus::Delivered => order.delivered_at = Some(change.at),
            OrderStatus::Cancelled => order.cancelled_at = Some(change.at),
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing => {}
        }
        if let Some(notes) = &change.notes {
            order.notes = Some(join_notes(order.notes.as_deref(), notes));
        }
        Ok(order.clone())
    }

    async fn apply_payment_change(&self, change: &PaymentChange) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock();
        let order = inner.order_mut(change.order_id)?;
        if order.payment_status != change.from || order.status.is_terminal() {
            return Err(StoreError::StaleStatus);
        }
        order.payment_status = change.to;
        order.updated_at = change.at;
        Ok(order.clone())
    }

    async fn append_notes(&self, id: OrderId, notes: &str) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock();
        let order = inner.order_mut(id)?;
        order.notes = Some(join_notes(order.notes.as_deref(), notes));
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}
