//! Integration test support for Souk.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory scenarios and concurrency tests
//! cargo test -p souk-integration-tests
//!
//! # Postgres-backed tests (needs a migrated database in DATABASE_URL)
//! cargo test -p souk-integration-tests -- --ignored
//! ```
//!
//! [`TestShop`] wires a [`CheckoutService`] to a [`MemoryCheckoutStore`], a
//! [`RecordingNotifier`] and a [`StubGateway`], with helpers to stock the
//! catalog.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use url::Url;

use souk_core::{CouponCode, CurrencyCode, Email, PaymentMethodId, ProductId, ShippingRateId};
use souk_storefront::checkout::{
    AddressInput, CartLine, CheckoutOptions, CheckoutService, CheckoutStore, CreateOrderRequest,
    MemoryCheckoutStore,
};
use souk_storefront::models::{
    CheckoutSettings, CurrentCustomer, DiscountType, GatewayCredentials, NewCoupon, NewCustomer,
    PaymentMethod, PaymentMethodConfig, Product, ShippingRate,
};
use souk_storefront::services::{
    ChargeIntent, ChargeRequest, GatewayError, Notification, Notifier, NotifyError,
    PaymentGateway,
};

/// Notifier that keeps every notification it is handed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Record notifications but report every delivery as rejected.
    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Kinds of the notifications received so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(Notification::kind).collect()
    }

    /// Wait until `count` notifications of `kind` arrived. Notifications are
    /// dispatched on spawned tasks.
    pub async fn wait_for(&self, kind: &str, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let matching: Vec<Notification> = self
                .sent
                .lock()
                .iter()
                .filter(|n| n.kind() == kind)
                .cloned()
                .collect();
            if matching.len() >= count {
                return matching;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} {kind} notifications, got {:?}", self.kinds());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().push(notification.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected { status: 503 });
        }
        Ok(())
    }
}

/// Gateway that answers every charge with a predictable payment URL.
#[derive(Debug, Default)]
pub struct StubGateway {
    charges: Mutex<Vec<ChargeRequest>>,
    rejecting: AtomicBool,
}

impl StubGateway {
    /// Refuse every charge from now on.
    pub fn reject_charges(&self) {
        self.rejecting.store(true, Ordering::SeqCst);
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, GatewayError> {
        self.charges.lock().push(request.clone());
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 402,
                message: "card declined".to_owned(),
            });
        }
        Ok(ChargeIntent {
            payment_url: Url::parse(&format!("https://pay.example.ma/c/{}", request.order_code))
                .unwrap(),
            reference: format!("ch_{}", request.order_code),
        })
    }
}

/// A storefront running over the in-memory store.
pub struct TestShop {
    pub store: Arc<MemoryCheckoutStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<StubGateway>,
    pub service: CheckoutService,
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

impl TestShop {
    pub fn new() -> Self {
        Self::with_store(MemoryCheckoutStore::new(), CheckoutOptions::default())
    }

    pub fn with_store(store: MemoryCheckoutStore, options: CheckoutOptions) -> Self {
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(StubGateway::default());
        let service = CheckoutService::new(
            Arc::clone(&store) as Arc<dyn CheckoutStore>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            options,
        );
        Self {
            store,
            notifier,
            gateway,
            service,
        }
    }

    /// Free shipping strictly above `threshold`. No default rate, no tax.
    pub fn with_free_shipping_over(self, threshold: i64) -> Self {
        self.store.set_settings(CheckoutSettings {
            free_shipping_threshold: Some(Decimal::from(threshold)),
            default_shipping_rate: None,
            flat_tax: Decimal::ZERO,
        });
        self
    }

    pub fn add_product(&self, sku: &str, price: Decimal, quantity: i32) -> ProductId {
        self.store.insert_product(Product {
            id: ProductId::new(0),
            name: format!("Product {sku}"),
            sku: sku.to_owned(),
            price,
            currency: CurrencyCode::MAD,
            quantity,
        })
    }

    pub fn add_city(&self, city: &str, cost: i64) -> ShippingRateId {
        self.store.insert_shipping_rate(ShippingRate {
            id: ShippingRateId::new(0),
            region: None,
            city: city.to_owned(),
            cost: Decimal::from(cost),
        })
    }

    /// Cash on delivery with a fixed fee of 10 MAD.
    pub fn add_cash_on_delivery(&self) -> PaymentMethodId {
        self.store.insert_payment_method(PaymentMethod {
            id: PaymentMethodId::new(0),
            code: "cod".to_owned(),
            name: "Cash on delivery".to_owned(),
            config: PaymentMethodConfig::Cash,
            enabled: true,
            fee_percentage: Decimal::ZERO,
            fee_fixed: Decimal::from(10),
            min_amount: None,
            max_amount: Some(Decimal::from(5000)),
            currencies: vec![CurrencyCode::MAD],
            processing_time: None,
            sort_order: 1,
        })
    }

    /// Card gateway charging 2.5%.
    pub fn add_card_gateway(&self) -> PaymentMethodId {
        self.store.insert_payment_method(PaymentMethod {
            id: PaymentMethodId::new(0),
            code: "cmi".to_owned(),
            name: "Card".to_owned(),
            config: PaymentMethodConfig::Gateway(GatewayCredentials {
                provider: "cmi".to_owned(),
                merchant_id: "600001234".to_owned(),
                secret_key: "sk_test_cmi".to_owned(),
            }),
            enabled: true,
            fee_percentage: Decimal::new(25, 1),
            fee_fixed: Decimal::ZERO,
            min_amount: None,
            max_amount: None,
            currencies: vec![CurrencyCode::MAD, CurrencyCode::EUR],
            processing_time: Some("Instant".to_owned()),
            sort_order: 0,
        })
    }

    /// 20% off subtotals of 200 or more.
    pub fn add_welcome20(&self, usage_limit: Option<i32>) -> CouponCode {
        let code = CouponCode::parse("WELCOME20").unwrap();
        self.store
            .insert_coupon(NewCoupon {
                code: code.clone(),
                discount_type: DiscountType::Percentage,
                value: Decimal::from(20),
                minimum_amount: Decimal::from(200),
                maximum_discount: None,
                usage_limit,
                starts_at: None,
                expires_at: None,
                currency: None,
            })
            .unwrap();
        code
    }

    /// A registered (non-guest) account, as if signed in.
    pub async fn register(&self, email: &str) -> CurrentCustomer {
        let customer = self
            .store
            .insert_customer(NewCustomer {
                email: Email::parse(email).unwrap(),
                name: "Registered Buyer".to_owned(),
                phone: None,
                is_guest: false,
                password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_owned(),
            })
            .await
            .unwrap();
        CurrentCustomer {
            id: customer.id,
            email: customer.email,
        }
    }
}

pub fn line(product_id: ProductId, quantity: i64) -> CartLine {
    CartLine {
        product_id,
        quantity,
    }
}

/// A Casablanca address for `email`.
pub fn address(email: Option<&str>) -> AddressInput {
    AddressInput {
        name: "Amina Benali".to_owned(),
        phone: "+212 600-112233".to_owned(),
        email: email.map(str::to_owned),
        address: "12 Rue Ibn Batouta".to_owned(),
        city: "Casablanca".to_owned(),
        region: None,
        postal_code: Some("20250".to_owned()),
    }
}

pub fn order_request(
    items: Vec<CartLine>,
    method: PaymentMethodId,
    email: Option<&str>,
) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        address: address(email),
        coupon_code: None,
        payment_method_id: method,
        guest: None,
        notes: None,
        currency: None,
    }
}
