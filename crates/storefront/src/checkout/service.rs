//! Checkout orchestration.
//!
//! [`CheckoutService`] wires the pure components (shipping, coupon, payment,
//! pricing, lifecycle) to a [`CheckoutStore`], a notifier and a payment
//! gateway. Everything before the commit is read-only, so an abandoned or
//! rejected checkout leaves no trace apart from a possibly provisioned guest
//! account.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use souk_core::{
    CouponCode, CurrencyCode, CustomerId, Email, OrderId, OrderStatus, PaymentMethodId,
    PaymentStatus, ProductId,
};

use super::coupon::{AppliedCoupon, validate_coupon};
use super::error::{CheckoutError, ErrorCategory};
use super::guest::{GuestContact, TemporaryCredential, provision_guest};
use super::lifecycle::{PaymentDecision, plan_payment_change, plan_status_change};
use super::order_code::{self, MAX_CODE_ATTEMPTS};
use super::payment::{MethodOffer, eligible_methods, select_method};
use super::pricing::Pricing;
use super::shipping::{ShippingQuote, resolve_shipping};
use super::store::{CheckoutStore, StoreError};
use crate::models::{
    CurrentCustomer, Customer, Destination, NewOrder, NewOrderItem, Order, PaymentMethod,
    PaymentMethodConfig, Product, ShippingAddress,
};
use crate::services::{
    ChargeRequest, DeliveredCredential, Notification, Notifier, PaymentGateway, dispatch,
};

/// Largest quantity accepted for one product.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Service-level knobs, from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutOptions {
    /// Cart currency when the request does not name one.
    pub default_currency: CurrencyCode,
    /// Upper bound on the order commit. Work not committed by then is rolled
    /// back and the checkout fails.
    pub commit_timeout: Duration,
    /// Domain of placeholder guest emails.
    pub guest_email_domain: String,
    /// Where the gateway sends buyers back to after paying.
    pub payment_return_url: Option<Url>,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            default_currency: CurrencyCode::MAD,
            commit_timeout: Duration::from_secs(5),
            guest_email_domain: "guest.invalid".to_owned(),
            payment_return_url: None,
        }
    }
}

/// One cart line as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Shipping address as submitted. Validated into a [`ShippingAddress`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl AddressInput {
    fn destination(&self) -> Destination {
        Destination {
            region: self.region.clone(),
            city: Some(self.city.clone()),
        }
    }
}

/// Price preview request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRequest {
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Price preview. Nothing is reserved or redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: ShippingQuote,
    pub coupon: Option<AppliedCoupon>,
    /// Reason code when a submitted coupon was rejected.
    pub coupon_error: Option<&'static str>,
    pub discount: Decimal,
    pub tax: Decimal,
    /// `subtotal + shipping - discount`, with unknown shipping counted as 0.
    pub amount_before_fee: Decimal,
    pub payment_methods: Vec<MethodOffer>,
}

/// Order placement request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartLine>,
    pub address: AddressInput,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment_method_id: PaymentMethodId,
    /// Contact for guest provisioning. Falls back to the address fields.
    #[serde(default)]
    pub guest: Option<GuestContact>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub order_code: String,
    pub customer_id: CustomerId,
    /// Set when the buyer was not signed in. The session should adopt it.
    #[serde(skip)]
    pub session_customer: Option<CurrentCustomer>,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_url: Option<Url>,
}

/// A cart line joined with its product.
#[derive(Debug, Clone)]
struct PricedLine {
    product: Product,
    quantity: i32,
    total: Decimal,
}

#[derive(Debug)]
struct PricedCart {
    lines: Vec<PricedLine>,
    subtotal: Decimal,
}

/// The checkout engine.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn CheckoutStore>,
    notifier: Arc<dyn Notifier>,
    gateway: Arc<dyn PaymentGateway>,
    options: CheckoutOptions,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn PaymentGateway>,
        options: CheckoutOptions,
    ) -> Self {
        Self {
            store,
            notifier,
            gateway,
            options,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn CheckoutStore {
        self.store.as_ref()
    }

    #[must_use]
    pub const fn options(&self) -> &CheckoutOptions {
        &self.options
    }

    // =========================================================================
    // Read-only
    // =========================================================================

    /// Price a cart without side effects.
    ///
    /// A rejected coupon does not fail the quote; its reason code is returned
    /// in `coupon_error` instead.
    ///
    /// # Errors
    ///
    /// Returns cart validation errors. An unknown destination is reported
    /// in the quote, not as an error.
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote, CheckoutError> {
        let currency = request.currency.unwrap_or(self.options.default_currency);
        let cart = self.price_cart(&request.items, currency).await?;
        let settings = self.store.settings().await?;
        let rates = self.store.shipping_rates().await?;

        let shipping = match resolve_shipping(&request.destination, cart.subtotal, &settings, &rates)
        {
            Err(CheckoutError::ShippingUnresolved) => ShippingQuote::Unavailable,
            other => other?,
        };

        let (coupon, coupon_error) = match request.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                match self.apply_coupon(code, cart.subtotal, currency).await {
                    Ok(applied) => (Some(applied), None),
                    Err(e) if e.category() == ErrorCategory::Validation => {
                        (None, Some(e.reason_code()))
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => (None, None),
        };
        let discount = coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount);

        let priced = Pricing::new(currency, cart.subtotal)
            .with_shipping(shipping.amount().unwrap_or_default())
            .with_discount(discount);
        let amount_before_fee = priced.pre_fee_amount();

        let methods = self.store.payment_methods().await?;

        Ok(Quote {
            currency,
            subtotal: priced.subtotal(),
            shipping,
            coupon,
            coupon_error,
            discount: priced.discount(),
            tax: currency.round(settings.flat_tax.max(Decimal::ZERO)),
            amount_before_fee,
            payment_methods: eligible_methods(&methods, amount_before_fee, currency),
        })
    }

    /// Validate a coupon code against a subtotal without redeeming it.
    ///
    /// # Errors
    ///
    /// Returns the coupon validation error.
    #[instrument(skip(self))]
    pub async fn check_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
        currency: Option<CurrencyCode>,
    ) -> Result<AppliedCoupon, CheckoutError> {
        let currency = currency.unwrap_or(self.options.default_currency);
        self.apply_coupon(code, currency.round(subtotal), currency)
            .await
    }

    /// Payment methods offered for an order worth `amount` (before fee).
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn payment_methods(
        &self,
        amount: Decimal,
        currency: Option<CurrencyCode>,
    ) -> Result<Vec<MethodOffer>, CheckoutError> {
        let currency = currency.unwrap_or(self.options.default_currency);
        let methods = self.store.payment_methods().await?;
        Ok(eligible_methods(&methods, amount, currency))
    }

    /// Look up an order for tracking. The email must match the one on the
    /// order; a mismatch is reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` or `InvalidEmail`.
    #[instrument(skip(self, email))]
    pub async fn find_order_by_code(
        &self,
        code: &str,
        email: &str,
    ) -> Result<Order, CheckoutError> {
        let email = Email::parse(email)?;
        self.store
            .order_by_code(&code.trim().to_uppercase())
            .await?
            .filter(|order| order.address.email == email)
            .ok_or(CheckoutError::OrderNotFound)
    }

    // =========================================================================
    // Order creation
    // =========================================================================

    /// Price, validate and commit an order.
    ///
    /// `customer` is the signed-in customer, if any. Without one a guest
    /// account is found or created for the buyer's contact details.
    ///
    /// # Errors
    ///
    /// Returns validation errors for bad carts, coupons, addresses and
    /// payment methods, `ShippingUnresolved`, and contention errors
    /// (`StockUnavailable`, `CouponExhausted`, `CommitTimeout`) when the
    /// commit loses a race. No stock or coupon usage is consumed on error.
    #[instrument(
        skip(self, request, customer),
        fields(
            lines = request.items.len(),
            method = %request.payment_method_id,
            order_code = tracing::field::Empty
        )
    )]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        customer: Option<CurrentCustomer>,
    ) -> Result<OrderReceipt, CheckoutError> {
        let currency = request.currency.unwrap_or(self.options.default_currency);
        let cart = self.price_cart(&request.items, currency).await?;

        let settings = self.store.settings().await?;
        let rates = self.store.shipping_rates().await?;
        let shipping = resolve_shipping(
            &request.address.destination(),
            cart.subtotal,
            &settings,
            &rates,
        )?
        .require()?;
        let address = validate_address(&request.address)?;

        let coupon = match request.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                Some(self.apply_coupon(code, cart.subtotal, currency).await?)
            }
            _ => None,
        };

        let priced = Pricing::new(currency, cart.subtotal)
            .with_shipping(shipping)
            .with_discount(coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount));

        let methods = self.store.payment_methods().await?;
        let (method, fee) = select_method(
            &methods,
            request.payment_method_id,
            priced.pre_fee_amount(),
            currency,
        )?;

        let totals = priced
            .with_payment_fee(fee)
            .with_tax(settings.flat_tax)
            .finalize()
            .inspect_err(|e| tracing::error!(error = %e, "Pricing invariant violated"))?;

        // Accounts are only touched once everything else checks out.
        let (owner, fresh_credential, adopted) = self.resolve_customer(&request, customer).await?;

        let email = match request.address.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(e) => Email::parse(e)?,
            None => owner.email.clone(),
        };

        let template = NewOrder {
            code: String::new(),
            customer_id: Some(owner.id),
            items: cart
                .lines
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product.id,
                    name: line.product.name.clone(),
                    sku: line.product.sku.clone(),
                    price: line.product.price,
                    quantity: line.quantity,
                    total: line.total,
                })
                .collect(),
            totals,
            address: address.with_email(email),
            payment_method_id: method.id,
            payment_method_code: method.code.clone(),
            coupon: coupon.as_ref().map(|c| (c.coupon_id, c.code.clone())),
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
        };

        let deadline = Instant::now() + self.options.commit_timeout;
        let order = match self.commit(template, deadline).await {
            Err(CheckoutError::CommitTimeout) => {
                warn!(reason = "commit_timeout", "Order commit timed out and was rolled back");
                return Err(CheckoutError::CommitTimeout);
            }
            other => other?,
        };

        tracing::Span::current().record("order_code", order.code.as_str());
        info!(
            order_id = %order.id,
            total = %order.totals.total,
            coupon = order.coupon_code.as_ref().map(CouponCode::as_str),
            "Order placed"
        );

        let payment_url = self.request_charge(&order, method).await;

        dispatch(
            Arc::clone(&self.notifier),
            Notification::OrderPlaced {
                order_code: order.code.clone(),
                email: order.address.email.clone(),
                total: order.totals.total,
                currency: order.totals.currency,
            },
        );
        if owner.is_guest
            && !owner.credential_delivered
            && let Err(e) = self.deliver_credential(&owner, fresh_credential).await
        {
            warn!(customer_id = %owner.id, error = %e, "Failed to deliver guest credential");
        }

        Ok(OrderReceipt {
            order_id: order.id,
            order_code: order.code,
            customer_id: owner.id,
            session_customer: adopted,
            total: order.totals.total,
            currency: order.totals.currency,
            status: order.status,
            payment_status: order.payment_status,
            payment_url,
        })
    }

    /// Insert the order under a fresh code, retrying code collisions. All
    /// attempts share `deadline`.
    async fn commit(&self, mut order: NewOrder, deadline: Instant) -> Result<Order, CheckoutError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            order.code = order_code::generate(Utc::now());
            match self.store.commit_order(order.clone(), deadline).await {
                Ok(committed) => return Ok(committed),
                Err(StoreError::DuplicateOrderCode) => {
                    debug!(attempt, code = %order.code, "Order code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::OrderCodeExhausted)
    }

    /// The account that will own the order.
    ///
    /// Returns the customer, the credential generated if the account was
    /// created just now, and the identity the session should adopt.
    async fn resolve_customer(
        &self,
        request: &CreateOrderRequest,
        session: Option<CurrentCustomer>,
    ) -> Result<(Customer, Option<TemporaryCredential>, Option<CurrentCustomer>), CheckoutError>
    {
        if let Some(current) = session {
            match self.store.customer(current.id).await? {
                Some(customer) => return Ok((customer, None, None)),
                None => debug!(customer_id = %current.id, "Session customer no longer exists"),
            }
        }

        let contact = request.guest.clone().unwrap_or_else(|| GuestContact {
            name: request.address.name.clone(),
            email: request.address.email.clone(),
            phone: Some(request.address.phone.clone()),
        });
        let provisioned =
            provision_guest(self.store.as_ref(), &contact, &self.options.guest_email_domain)
                .await?;
        let adopted = CurrentCustomer {
            id: provisioned.customer.id,
            email: provisioned.customer.email.clone(),
        };
        Ok((provisioned.customer, provisioned.credential, Some(adopted)))
    }

    /// Send a guest their temporary credential and mark it delivered.
    ///
    /// Accounts reused from an earlier failed checkout get a new credential,
    /// since the old plaintext is gone.
    async fn deliver_credential(
        &self,
        customer: &Customer,
        fresh: Option<TemporaryCredential>,
    ) -> Result<(), CheckoutError> {
        let credential = match fresh {
            Some(credential) => credential,
            None => {
                let rotated = TemporaryCredential::generate()?;
                self.store
                    .rotate_credential(customer.id, rotated.hash())
                    .await?;
                rotated
            }
        };

        dispatch(
            Arc::clone(&self.notifier),
            Notification::GuestAccountCreated {
                email: customer.email.clone(),
                temporary_password: DeliveredCredential::new(credential.expose()),
            },
        );
        self.store.mark_credential_delivered(customer.id).await?;
        Ok(())
    }

    /// Ask the gateway for a charge when the method needs one. Failure is
    /// logged and leaves the order pending without a payment URL.
    async fn request_charge(&self, order: &Order, method: &PaymentMethod) -> Option<Url> {
        let provider = match &method.config {
            PaymentMethodConfig::Gateway(c) => c.provider.clone(),
            PaymentMethodConfig::Wallet(c) => c.provider.clone(),
            PaymentMethodConfig::BankTransfer(_) | PaymentMethodConfig::Cash => return None,
        };

        let request = ChargeRequest {
            order_code: order.code.clone(),
            amount: order.totals.total,
            currency: order.totals.currency,
            method: method.code.clone(),
            provider,
            return_url: self.options.payment_return_url.clone(),
        };

        match self.gateway.create_charge(&request).await {
            Ok(intent) => Some(intent.payment_url),
            Err(e) => {
                warn!(
                    order_code = %order.code,
                    reason = "gateway_error",
                    error = %e,
                    "Charge intent failed, order left pending"
                );
                None
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Move an order to `to`.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `IllegalTransition`, `PaymentFailed`, or
    /// `ConcurrentUpdate` if another writer moved the order first.
    #[instrument(skip(self, notes))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        let coupon = match (&order.coupon_code, to) {
            (Some(code), OrderStatus::Cancelled) => self.store.coupon_by_code(code).await?,
            _ => None,
        };

        let change = plan_status_change(&order, to, coupon.as_ref(), notes, Utc::now())?;
        let updated = self.store.apply_status_change(&change).await?;

        info!(
            order_code = %updated.code,
            from = %change.from,
            to = %change.to,
            restocked = change.restock.len(),
            coupon_released = change.release_coupon.is_some(),
            "Order status changed"
        );
        dispatch(
            Arc::clone(&self.notifier),
            Notification::StatusChanged {
                order_code: updated.code.clone(),
                email: updated.address.email.clone(),
                from: change.from,
                to: change.to,
            },
        );
        Ok(updated)
    }

    /// Record a payment outcome reported by the gateway.
    ///
    /// Repeating an outcome the order already has is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `IllegalPaymentTransition`, or
    /// `ConcurrentUpdate`.
    #[instrument(skip(self))]
    pub async fn handle_payment_callback(
        &self,
        order_id: OrderId,
        outcome: PaymentStatus,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        let change = match plan_payment_change(&order, outcome, Utc::now())? {
            PaymentDecision::Unchanged => {
                debug!(order_code = %order.code, %outcome, "Repeated payment callback ignored");
                return Ok(order);
            }
            PaymentDecision::Change(change) => change,
        };

        let updated = self.store.apply_payment_change(&change).await?;
        info!(
            order_code = %updated.code,
            from = %change.from,
            to = %change.to,
            "Payment status changed"
        );
        dispatch(
            Arc::clone(&self.notifier),
            Notification::PaymentUpdated {
                order_code: updated.code.clone(),
                email: updated.address.email.clone(),
                from: change.from,
                to: change.to,
            },
        );
        Ok(updated)
    }

    /// Append admin notes. Allowed in every status, terminal ones included.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for blank notes and `OrderNotFound`.
    #[instrument(skip(self, notes))]
    pub async fn add_order_notes(
        &self,
        order_id: OrderId,
        notes: &str,
    ) -> Result<Order, CheckoutError> {
        if notes.trim().is_empty() {
            return Err(CheckoutError::MissingField("notes"));
        }
        Ok(self.store.append_notes(order_id, notes).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn apply_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
        currency: CurrencyCode,
    ) -> Result<AppliedCoupon, CheckoutError> {
        let code = CouponCode::parse(code)?;
        let coupon = self.store.coupon_by_code(&code).await?;
        validate_coupon(&code, coupon.as_ref(), subtotal, currency, Utc::now())
    }

    /// Validate cart lines and price them against the catalog.
    async fn price_cart(
        &self,
        items: &[CartLine],
        currency: CurrencyCode,
    ) -> Result<PricedCart, CheckoutError> {
        let merged = merge_lines(items)?;
        let ids: Vec<ProductId> = merged.iter().map(|(id, _)| *id).collect();
        let products = self.store.products(&ids).await?;

        let mut lines = Vec::with_capacity(merged.len());
        for (product_id, quantity) in merged {
            let product = products
                .iter()
                .find(|p| p.id == product_id)
                .cloned()
                .ok_or(CheckoutError::UnknownProduct(product_id))?;
            if product.currency != currency {
                return Err(CheckoutError::CurrencyMismatch {
                    product_id,
                    expected: currency,
                    found: product.currency,
                });
            }
            let total = currency.round(product.price * Decimal::from(quantity));
            lines.push(PricedLine {
                product,
                quantity,
                total,
            });
        }

        let subtotal = lines.iter().map(|l| l.total).sum();
        Ok(PricedCart {
            lines,
            subtotal,
        })
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Merge duplicate product lines, keeping first-seen order.
fn merge_lines(items: &[CartLine]) -> Result<Vec<(ProductId, i32)>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut merged: Vec<(ProductId, i64)> = Vec::with_capacity(items.len());
    for line in items {
        if line.quantity < 1 || line.quantity > MAX_LINE_QUANTITY {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => merged.push((line.product_id, line.quantity)),
        }
    }

    merged
        .into_iter()
        .map(|(product_id, quantity)| {
            i32::try_from(quantity)
                .ok()
                .filter(|q| i64::from(*q) <= MAX_LINE_QUANTITY)
                .map(|q| (product_id, q))
                .ok_or(CheckoutError::InvalidQuantity {
                    product_id,
                    quantity,
                })
        })
        .collect()
}

/// Address fields checked, email still to be decided.
struct CheckedAddress {
    name: String,
    phone: String,
    address: String,
    city: String,
    region: Option<String>,
    postal_code: Option<String>,
}

impl CheckedAddress {
    fn with_email(self, email: Email) -> ShippingAddress {
        ShippingAddress {
            name: self.name,
            phone: self.phone,
            email,
            address: self.address,
            city: self.city,
            region: self.region,
            postal_code: self.postal_code,
        }
    }
}

fn validate_address(input: &AddressInput) -> Result<CheckedAddress, CheckoutError> {
    fn required(value: &str, field: &'static str) -> Result<String, CheckoutError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CheckoutError::MissingField(field));
        }
        Ok(value.to_owned())
    }

    fn optional(value: Option<&String>) -> Option<String> {
        value
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        Email::parse(email)?;
    }

    Ok(CheckedAddress {
        name: required(&input.name, "name")?,
        phone: required(&input.phone, "phone")?,
        address: required(&input.address, "address")?,
        city: required(&input.city, "city")?,
        region: optional(input.region.as_ref()),
        postal_code: optional(input.postal_code.as_ref()),
    })
}
