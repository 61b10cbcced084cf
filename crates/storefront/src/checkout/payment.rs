//! Payment method eligibility and fees.
//!
//! The amount a method is evaluated against is the pre-fee total
//! (`subtotal + shipping - discount`). Offers shown to the customer are only a
//! preview; [`select_method`] re-evaluates the chosen method at commit time.

use rust_decimal::Decimal;
use serde::Serialize;

use souk_core::{CurrencyCode, PaymentMethodId};

use super::error::CheckoutError;
use crate::models::{PaymentMethod, PaymentMethodView};

/// A payment method offered for an order, with its fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodOffer {
    #[serde(flatten)]
    pub method: PaymentMethodView,
    pub fee: Decimal,
}

/// Whether `method` can pay `amount` in `currency`.
#[must_use]
pub fn is_offered(method: &PaymentMethod, amount: Decimal, currency: CurrencyCode) -> bool {
    method.enabled && method.supports_currency(currency) && method.accepts_amount(amount)
}

/// Fee charged by `method` on `amount`: percentage plus fixed part, rounded to
/// the currency's minor unit. Never negative.
#[must_use]
pub fn compute_fee(method: &PaymentMethod, amount: Decimal, currency: CurrencyCode) -> Decimal {
    let amount = amount.max(Decimal::ZERO);
    let fee = amount * method.fee_percentage / Decimal::ONE_HUNDRED + method.fee_fixed;
    currency.round(fee).max(Decimal::ZERO)
}

/// Methods offered for `amount`, ordered by sort order then code.
#[must_use]
pub fn eligible_methods(
    methods: &[PaymentMethod],
    amount: Decimal,
    currency: CurrencyCode,
) -> Vec<MethodOffer> {
    let mut offered: Vec<&PaymentMethod> = methods
        .iter()
        .filter(|m| is_offered(m, amount, currency))
        .collect();
    offered.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.code.cmp(&b.code)));
    offered
        .into_iter()
        .map(|m| MethodOffer {
            method: PaymentMethodView::from(m),
            fee: compute_fee(m, amount, currency),
        })
        .collect()
}

/// Resolve the customer's chosen method and its fee at commit time.
///
/// # Errors
///
/// Returns `UnknownPaymentMethod` if no method has `id`, or
/// `PaymentMethodUnavailable` if it is disabled or not eligible for `amount`.
pub fn select_method(
    methods: &[PaymentMethod],
    id: PaymentMethodId,
    amount: Decimal,
    currency: CurrencyCode,
) -> Result<(&PaymentMethod, Decimal), CheckoutError> {
    let method = methods
        .iter()
        .find(|m| m.id == id)
        .ok_or(CheckoutError::UnknownPaymentMethod(id))?;
    if !is_offered(method, amount, currency) {
        return Err(CheckoutError::PaymentMethodUnavailable(method.code.clone()));
    }
    Ok((method, compute_fee(method, amount, currency)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{BankDetails, PaymentMethodConfig};

    fn method(id: i64, code: &str, sort_order: i32) -> PaymentMethod {
        PaymentMethod {
            id: PaymentMethodId::new(id),
            code: code.to_owned(),
            name: code.to_uppercase(),
            config: PaymentMethodConfig::Cash,
            enabled: true,
            fee_percentage: Decimal::ZERO,
            fee_fixed: Decimal::ZERO,
            min_amount: None,
            max_amount: None,
            currencies: vec![CurrencyCode::MAD],
            processing_time: None,
            sort_order,
        }
    }

    #[test]
    fn test_fee_is_percentage_plus_fixed() {
        let card = PaymentMethod {
            fee_percentage: Decimal::new(25, 1),
            fee_fixed: Decimal::from(2),
            ..method(1, "card", 0)
        };
        // 2.5% of 123.45 = 3.08625 -> 3.09, + 2
        assert_eq!(
            compute_fee(&card, Decimal::new(12_345, 2), CurrencyCode::MAD),
            Decimal::new(509, 2)
        );
    }

    #[test]
    fn test_negative_fee_is_clamped() {
        let odd = PaymentMethod {
            fee_fixed: Decimal::from(-5),
            ..method(1, "odd", 0)
        };
        assert_eq!(
            compute_fee(&odd, Decimal::from(100), CurrencyCode::MAD),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_filters_disabled_currency_and_bounds() {
        let methods = vec![
            method(1, "cod", 2),
            PaymentMethod {
                enabled: false,
                ..method(2, "off", 0)
            },
            PaymentMethod {
                currencies: vec![CurrencyCode::EUR],
                ..method(3, "sepa", 0)
            },
            PaymentMethod {
                max_amount: Some(Decimal::from(100)),
                ..method(4, "wallet", 1)
            },
            PaymentMethod {
                min_amount: Some(Decimal::from(50)),
                config: PaymentMethodConfig::BankTransfer(BankDetails {
                    bank_name: "CIH".to_owned(),
                    account_holder: "Souk".to_owned(),
                    iban: "MA00".to_owned(),
                    swift: None,
                }),
                ..method(5, "bank", 1)
            },
        ];

        let codes = |amount: i64| -> Vec<String> {
            eligible_methods(&methods, Decimal::from(amount), CurrencyCode::MAD)
                .into_iter()
                .map(|o| o.method.code)
                .collect()
        };
        assert_eq!(codes(20), vec!["wallet", "cod"]);
        assert_eq!(codes(100), vec!["bank", "wallet", "cod"]);
        assert_eq!(codes(101), vec!["bank", "cod"]);
    }

    #[test]
    fn test_select_method_revalidates_amount() {
        let methods = vec![PaymentMethod {
            max_amount: Some(Decimal::from(100)),
            ..method(4, "wallet", 1)
        }];
        assert!(select_method(&methods, PaymentMethodId::new(4), Decimal::from(90), CurrencyCode::MAD).is_ok());
        assert!(matches!(
            select_method(&methods, PaymentMethodId::new(4), Decimal::from(120), CurrencyCode::MAD),
            Err(CheckoutError::PaymentMethodUnavailable(code)) if code == "wallet"
        ));
        assert!(matches!(
            select_method(&methods, PaymentMethodId::new(9), Decimal::from(10), CurrencyCode::MAD),
            Err(CheckoutError::UnknownPaymentMethod(_))
        ));
    }
}
