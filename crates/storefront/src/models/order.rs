//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{
    CouponCode, CouponId, CurrencyCode, CustomerId, Email, OrderId, OrderItemId, OrderStatus,
    PaymentMethodId, PaymentStatus, ProductId,
};

/// Shipping address captured at order time.
///
/// A snapshot: later edits to the customer's saved addresses do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub email: Email,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Monetary breakdown of an order.
///
/// Only the pricing pipeline constructs these for new orders, so
/// `total == subtotal + shipping + tax + payment_fee - discount` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub payment_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Whether the stored total agrees with its components.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        let expected = self.currency.round(
            self.subtotal + self.shipping + self.tax + self.payment_fee - self.discount,
        );
        self.total == expected && self.total >= Decimal::ZERO
    }
}

/// A line item snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the catalog product has been removed.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub quantity: i32,
    /// `price * quantity`.
    pub total: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable code, e.g. `ORD-20260118-7KX2QF`.
    pub code: String,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub address: ShippingAddress,
    pub payment_method_id: PaymentMethodId,
    pub payment_method_code: String,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<CouponCode>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Quantities to put back on the shelf, one entry per item whose product
    /// still exists.
    #[must_use]
    pub fn restock_lines(&self) -> Vec<(ProductId, i32)> {
        self.items
            .iter()
            .filter_map(|item| item.product_id.map(|id| (id, item.quantity)))
            .collect()
    }
}

/// Line item of an order about to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

/// An order about to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub code: String,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<NewOrderItem>,
    pub totals: OrderTotals,
    pub address: ShippingAddress,
    pub payment_method_id: PaymentMethodId,
    pub payment_method_code: String,
    pub coupon: Option<(CouponId, CouponCode)>,
    pub notes: Option<String>,
}

impl NewOrder {
    /// Stock to reserve, merged per product and sorted by product id.
    ///
    /// Every writer locks product rows in this order, which keeps concurrent
    /// commits from deadlocking on each other.
    #[must_use]
    pub fn stock_reservations(&self) -> Vec<(ProductId, i32)> {
        let mut lines: Vec<(ProductId, i32)> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match lines.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => lines.push((item.product_id, item.quantity)),
            }
        }
        lines.sort_by_key(|(id, _)| *id);
        lines
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product: i64, quantity: i32) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::new(product),
            name: format!("Product {product}"),
            sku: format!("SKU-{product}"),
            price: Decimal::TEN,
            quantity,
            total: Decimal::TEN * Decimal::from(quantity),
        }
    }

    #[test]
    fn test_stock_reservations_sorted_and_merged() {
        let order = NewOrder {
            code: "ORD-20260101-AAAAAA".to_owned(),
            customer_id: None,
            items: vec![item(9, 1), item(3, 2), item(9, 4)],
            totals: OrderTotals {
                currency: CurrencyCode::MAD,
                subtotal: Decimal::ZERO,
                shipping: Decimal::ZERO,
                discount: Decimal::ZERO,
                payment_fee: Decimal::ZERO,
                tax: Decimal::ZERO,
                total: Decimal::ZERO,
            },
            address: ShippingAddress {
                name: "Amina".to_owned(),
                phone: "0600000000".to_owned(),
                email: Email::parse("amina@example.ma").unwrap(),
                address: "12 Rue Ibn Batouta".to_owned(),
                city: "Rabat".to_owned(),
                region: None,
                postal_code: None,
            },
            payment_method_id: PaymentMethodId::new(1),
            payment_method_code: "cod".to_owned(),
            coupon: None,
            notes: None,
        };
        assert_eq!(
            order.stock_reservations(),
            vec![(ProductId::new(3), 2), (ProductId::new(9), 5)]
        );
    }

    #[test]
    fn test_totals_balance() {
        let totals = OrderTotals {
            currency: CurrencyCode::MAD,
            subtotal: Decimal::from(300),
            shipping: Decimal::from(30),
            discount: Decimal::from(60),
            payment_fee: Decimal::new(550, 2),
            tax: Decimal::ZERO,
            total: Decimal::new(27_550, 2),
        };
        assert!(totals.is_balanced());
        assert!(
            !OrderTotals {
                total: Decimal::from(275),
                ..totals
            }
            .is_balanced()
        );
    }
}
