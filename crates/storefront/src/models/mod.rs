//! Domain models for the checkout engine.
//!
//! These are plain records: repositories and the in-memory store build them,
//! the checkout engine reads them. None of them perform I/O.

pub mod coupon;
pub mod customer;
pub mod order;
pub mod payment_method;
pub mod product;
pub mod session;
pub mod settings;
pub mod shipping;

pub use coupon::{Coupon, DiscountType, NewCoupon};
pub use customer::{Customer, NewCustomer};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderTotals, ShippingAddress};
pub use payment_method::{
    BankDetails, GatewayCredentials, NewPaymentMethod, PaymentMethod, PaymentMethodConfig,
    PaymentMethodKind, PaymentMethodView, WalletCredentials,
};
pub use product::{NewProduct, Product};
pub use session::{CurrentCustomer, keys as session_keys};
pub use settings::CheckoutSettings;
pub use shipping::{Destination, NewShippingRate, ShippingRate};
