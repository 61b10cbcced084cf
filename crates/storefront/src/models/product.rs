//! Catalog snapshot read at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{CurrencyCode, ProductId};

/// A product as the checkout engine sees it.
///
/// The catalog itself is managed elsewhere; checkout only reads the name, sku
/// and price, and performs conditional stock updates on `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    /// Unit price in the product's currency.
    pub price: Decimal,
    pub currency: CurrencyCode,
    /// Units in stock. Never negative.
    pub quantity: i32,
}

/// Data for creating or updating a product, keyed by sku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub quantity: i32,
}
