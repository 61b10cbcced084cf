//! Order total composition.
//!
//! ```text
//! total = round(subtotal + shipping + tax + payment_fee - discount)
//! ```
//!
//! The terms are added by a pipeline of pure stages. Each stage consumes the
//! record and returns a new one tagged with the next stage type, so the order
//! subtotal, shipping, discount, payment fee, tax, finalize is checked by the
//! compiler: the fee can only be computed once the discount is known, and
//! [`Pricing::pre_fee_amount`] only exists on the post-discount record.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use souk_core::CurrencyCode;

use super::error::CheckoutError;
use crate::models::OrderTotals;

/// Pipeline stage markers.
pub mod stage {
    /// Subtotal known.
    #[derive(Debug, Clone, Copy)]
    pub struct Subtotal;
    /// Shipping added.
    #[derive(Debug, Clone, Copy)]
    pub struct Shipping;
    /// Discount applied.
    #[derive(Debug, Clone, Copy)]
    pub struct Discount;
    /// Payment fee added.
    #[derive(Debug, Clone, Copy)]
    pub struct Fee;
    /// Tax added, ready to finalize.
    #[derive(Debug, Clone, Copy)]
    pub struct Tax;
}

/// Immutable totals record at pipeline stage `S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing<S> {
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
    payment_fee: Decimal,
    tax: Decimal,
    _stage: PhantomData<S>,
}

/// Clamp a term to zero and round it to the minor unit.
fn term(currency: CurrencyCode, value: Decimal) -> Decimal {
    currency.round(value.max(Decimal::ZERO))
}

impl<S> Pricing<S> {
    const fn advance<T>(self) -> Pricing<T> {
        Pricing {
            currency: self.currency,
            subtotal: self.subtotal,
            shipping: self.shipping,
            discount: self.discount,
            payment_fee: self.payment_fee,
            tax: self.tax,
            _stage: PhantomData,
        }
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }
}

impl Pricing<stage::Subtotal> {
    /// Start pricing a cart worth `subtotal`.
    #[must_use]
    pub fn new(currency: CurrencyCode, subtotal: Decimal) -> Self {
        Self {
            currency,
            subtotal: term(currency, subtotal),
            shipping: Decimal::ZERO,
            discount: Decimal::ZERO,
            payment_fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            _stage: PhantomData,
        }
    }

    #[must_use]
    pub fn with_shipping(self, shipping: Decimal) -> Pricing<stage::Shipping> {
        let mut next = self.advance::<stage::Shipping>();
        next.shipping = term(self.currency, shipping);
        next
    }
}

impl Pricing<stage::Shipping> {
    /// Apply a discount. It reduces the subtotal only, never shipping, so it
    /// is capped at the subtotal.
    #[must_use]
    pub fn with_discount(self, discount: Decimal) -> Pricing<stage::Discount> {
        let mut next = self.advance::<stage::Discount>();
        next.discount = term(self.currency, discount).min(self.subtotal);
        next
    }
}

impl Pricing<stage::Discount> {
    #[must_use]
    pub const fn shipping(&self) -> Decimal {
        self.shipping
    }

    /// The discount after capping at the subtotal.
    #[must_use]
    pub const fn discount(&self) -> Decimal {
        self.discount
    }

    /// Amount payment methods are evaluated and charged against:
    /// `subtotal + shipping - discount`.
    #[must_use]
    pub fn pre_fee_amount(&self) -> Decimal {
        self.subtotal + self.shipping - self.discount
    }

    #[must_use]
    pub fn with_payment_fee(self, fee: Decimal) -> Pricing<stage::Fee> {
        let mut next = self.advance::<stage::Fee>();
        next.payment_fee = term(self.currency, fee);
        next
    }
}

impl Pricing<stage::Fee> {
    #[must_use]
    pub fn with_tax(self, tax: Decimal) -> Pricing<stage::Tax> {
        let mut next = self.advance::<stage::Tax>();
        next.tax = term(self.currency, tax);
        next
    }
}

impl Pricing<stage::Tax> {
    /// Compose the final total.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NegativeTotal` if the total comes out negative,
    /// which the earlier stages make impossible and therefore indicates a bug.
    pub fn finalize(self) -> Result<OrderTotals, CheckoutError> {
        let total = self.currency.round(
            self.subtotal + self.shipping + self.tax + self.payment_fee - self.discount,
        );
        if total < Decimal::ZERO {
            return Err(CheckoutError::NegativeTotal(total));
        }
        Ok(OrderTotals {
            currency: self.currency,
            subtotal: self.subtotal,
            shipping: self.shipping,
            discount: self.discount,
            payment_fee: self.payment_fee,
            tax: self.tax,
            total,
        })
    }
}

/// Run the whole pipeline with a precomputed fee.
///
/// # Errors
///
/// See [`Pricing::finalize`].
pub fn compose_totals(
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
    payment_fee: Decimal,
    tax: Decimal,
) -> Result<OrderTotals, CheckoutError> {
    Pricing::new(currency, subtotal)
        .with_shipping(shipping)
        .with_discount(discount)
        .with_payment_fee(payment_fee)
        .with_tax(tax)
        .finalize()
}
