//! # Totals Calculator
//!
//! Turns raw line items into calculated items plus document totals.
//!
//! ## Per-Item Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LineItemInput                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate (qty > 0, no negatives, description present)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  gross = quantity × unitPrice                                          │
//! │  net   = max(gross − discount, 0)        ← clamped, never negative     │
//! │  rate  = resolve(taxType?, taxRate?, default)                          │
//! │  tax   = net × rate                      ← exact decimal, unrounded    │
//! │  total = net + tax                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  running sums: subtotal += net, discountAmount += discount,            │
//! │                taxAmount += tax, totalAmount += total                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure: no I/O, no shared state. Same input, same output.

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::tax::{TaxRate, TaxType};
use crate::types::{CalculatedLineItem, Calculation, DocumentTotals, LineItemInput};
use crate::validation::validate_line_item;

/// How an item's effective tax rate is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxPolicy {
    /// Recognized `taxType` label first, then explicit `taxRate`, then default.
    /// Used for invoices.
    TaxTypeTable,
    /// Explicit `taxRate`, then default. Labels are carried but never priced.
    /// Used for quotes.
    ExplicitRateOnly,
}

impl TaxPolicy {
    fn resolve(&self, item: &LineItemInput, default_rate: TaxRate) -> (TaxRate, Option<TaxType>) {
        let tax_type = item.tax_type.as_deref().and_then(TaxType::from_label);
        let explicit = item.tax_rate.unwrap_or(default_rate);
        match (self, tax_type) {
            (TaxPolicy::TaxTypeTable, Some(t)) => (t.rate(), Some(t)),
            _ => (explicit, tax_type),
        }
    }
}

/// Calculates invoice totals.
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::calculator::calculate_invoice_totals;
/// use tally_core::money::Money;
/// use tally_core::tax::TaxRate;
/// use tally_core::types::LineItemInput;
///
/// let items = vec![
///     LineItemInput::new("Licence", Decimal::from(2), Money::new(Decimal::from(100))),
///     LineItemInput::new("Setup", Decimal::ONE, Money::new(Decimal::from(50)))
///         .with_discount(Money::new(Decimal::from(10))),
/// ];
/// let calc = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();
///
/// assert_eq!(calc.totals.subtotal.amount(), Decimal::from(240));
/// assert_eq!(calc.totals.total_amount.amount(), Decimal::new(2832, 1)); // 283.2
/// ```
pub fn calculate_invoice_totals(
    items: &[LineItemInput],
    default_rate: TaxRate,
) -> CoreResult<Calculation> {
    calculate_totals(items, default_rate, TaxPolicy::TaxTypeTable)
}

/// Calculates quote totals. Only an explicit `taxRate` or the default applies.
pub fn calculate_quote_totals(
    items: &[LineItemInput],
    default_rate: TaxRate,
) -> CoreResult<Calculation> {
    calculate_totals(items, default_rate, TaxPolicy::ExplicitRateOnly)
}

/// Calculates per-item amounts and document totals in one pass, in input order.
///
/// ## Errors
/// - [`CoreError::EmptyLineItems`] when `items` is empty
/// - [`CoreError::Validation`] for the first invalid item
/// - [`CoreError::AmountOutOfRange`] when a product or running sum overflows
pub fn calculate_totals(
    items: &[LineItemInput],
    default_rate: TaxRate,
    policy: TaxPolicy,
) -> CoreResult<Calculation> {
    if items.is_empty() {
        return Err(CoreError::EmptyLineItems);
    }

    let mut calculated = Vec::with_capacity(items.len());
    let mut totals = DocumentTotals::default();

    for (index, item) in items.iter().enumerate() {
        validate_line_item(index, item)?;

        let line = calculate_line(index, item, default_rate, policy)?;

        totals.subtotal = accumulate(totals.subtotal, line.net_amount, "subtotal")?;
        totals.discount_amount =
            accumulate(totals.discount_amount, line.discount, "discountAmount")?;
        totals.tax_amount = accumulate(totals.tax_amount, line.tax_amount, "taxAmount")?;
        totals.total_amount = accumulate(totals.total_amount, line.total_price, "totalAmount")?;

        calculated.push(line);
    }

    totals.due_amount = totals.total_amount;

    Ok(Calculation {
        items: calculated,
        totals,
    })
}

fn calculate_line(
    index: usize,
    item: &LineItemInput,
    default_rate: TaxRate,
    policy: TaxPolicy,
) -> CoreResult<CalculatedLineItem> {
    let out_of_range = |name: &str| CoreError::amount_out_of_range(format!("items[{index}].{name}"));

    let discount = item.discount.unwrap_or_default();
    let gross = item
        .unit_price
        .checked_mul(item.quantity)
        .ok_or_else(|| out_of_range("unitPrice"))?;
    let net_amount = gross
        .checked_sub(discount)
        .ok_or_else(|| out_of_range("discount"))?
        .clamp_non_negative();

    let (tax_rate, tax_type) = policy.resolve(item, default_rate);
    let tax_amount = net_amount
        .checked_tax_at(tax_rate)
        .ok_or_else(|| out_of_range("taxRate"))?;
    let total_price = net_amount
        .checked_add(tax_amount)
        .ok_or_else(|| out_of_range("totalPrice"))?;

    let order = match item.order {
        Some(order) => order,
        None => position(index)?,
    };

    Ok(CalculatedLineItem {
        description: item.description.trim().to_string(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        discount,
        tax_rate,
        tax_type,
        order,
        net_amount,
        tax_amount,
        total_price,
    })
}

fn accumulate(sum: Money, amount: Money, field: &str) -> CoreResult<Money> {
    sum.checked_add(amount)
        .ok_or_else(|| CoreError::amount_out_of_range(field))
}

/// Default display order for the item at `index`.
fn position(index: usize) -> CoreResult<i32> {
    i32::try_from(index).map_err(|_| {
        ValidationError::OutOfRange {
            field: format!("items[{index}].order"),
            min: 0,
            max: i64::from(i32::MAX),
        }
        .into()
    })
}

/// `max(total − paid, 0)`.
pub fn remaining_due(total: Money, paid: Money) -> Money {
    total.saturating_sub(paid).clamp_non_negative()
}

/// Whether an amount has been fully covered. Exact comparison; there is no
/// tolerance because nothing is ever rounded.
pub fn is_settled(due: Money) -> bool {
    due.amount() <= Decimal::ZERO
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d)
    }

    fn reference_items() -> Vec<LineItemInput> {
        vec![
            LineItemInput::new("Annual licence", dec!(2), money(dec!(100)))
                .with_discount(Money::zero())
                .with_tax_rate(TaxRate::new(dec!(0.18))),
            LineItemInput::new("Onboarding", dec!(1), money(dec!(50)))
                .with_discount(money(dec!(10)))
                .with_tax_rate(TaxRate::new(dec!(0.18))),
        ]
    }

    #[test]
    fn test_reference_document() {
        let calc = calculate_invoice_totals(&reference_items(), TaxRate::standard()).unwrap();

        assert_eq!(calc.items[0].total_price, money(dec!(236)));
        assert_eq!(calc.items[1].total_price, money(dec!(47.2)));
        assert_eq!(calc.totals.subtotal, money(dec!(240)));
        assert_eq!(calc.totals.discount_amount, money(dec!(10)));
        assert_eq!(calc.totals.tax_amount, money(dec!(43.2)));
        assert_eq!(calc.totals.total_amount, money(dec!(283.2)));
        assert_eq!(calc.totals.due_amount, calc.totals.total_amount);
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = calculate_invoice_totals(&[], TaxRate::standard()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyLineItems));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        assert!(calculate_quote_totals(&[], TaxRate::standard()).is_err());
    }

    #[test]
    fn test_invalid_item_rejected_with_index() {
        let mut items = reference_items();
        items[1].quantity = dec!(0);
        let err = calculate_invoice_totals(&items, TaxRate::standard()).unwrap_err();
        match err {
            CoreError::Validation(ValidationError::MustBePositive { field }) => {
                assert_eq!(field, "items[1].quantity")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_discount_larger_than_gross_is_clamped() {
        let items = vec![LineItemInput::new("Promo", dec!(1), money(dec!(20)))
            .with_discount(money(dec!(35)))];
        let calc = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();

        assert_eq!(calc.items[0].net_amount, Money::zero());
        assert_eq!(calc.items[0].tax_amount, Money::zero());
        assert_eq!(calc.totals.subtotal, Money::zero());
        assert_eq!(calc.totals.discount_amount, money(dec!(35)));
    }

    #[test]
    fn test_tax_type_takes_precedence_on_invoices() {
        let items = vec![LineItemInput::new("Books", dec!(1), money(dec!(100)))
            .with_tax_rate(TaxRate::new(dec!(0.21)))
            .with_tax_type("IVA_10")];

        let invoice = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();
        assert_eq!(invoice.items[0].tax_rate.fraction(), dec!(0.10));
        assert_eq!(invoice.items[0].tax_type, Some(TaxType::Iva10));
        assert_eq!(invoice.totals.tax_amount, money(dec!(10)));

        let quote = calculate_quote_totals(&items, TaxRate::standard()).unwrap();
        assert_eq!(quote.items[0].tax_rate.fraction(), dec!(0.21));
        assert_eq!(quote.totals.tax_amount, money(dec!(21)));
    }

    #[test]
    fn test_rate_fallbacks() {
        let exempt = LineItemInput::new("Export", dec!(1), money(dec!(100))).with_tax_type("EXEMPT");
        let unknown = LineItemInput::new("Other", dec!(1), money(dec!(100))).with_tax_type("VAT_20");
        let plain = LineItemInput::new("Plain", dec!(1), money(dec!(100)));

        let calc = calculate_invoice_totals(
            &[exempt, unknown, plain],
            TaxRate::new(dec!(0.05)),
        )
        .unwrap();

        assert_eq!(calc.items[0].tax_amount, Money::zero());
        // unknown label falls through to the default
        assert_eq!(calc.items[1].tax_rate.fraction(), dec!(0.05));
        assert_eq!(calc.items[1].tax_type, None);
        assert_eq!(calc.items[2].tax_amount, money(dec!(5)));
    }

    #[test]
    fn test_order_defaults_to_position_and_keeps_explicit_values() {
        let items = vec![
            LineItemInput::new("a", dec!(1), money(dec!(1))).with_order(7),
            LineItemInput::new("b", dec!(1), money(dec!(1))),
            LineItemInput::new("c", dec!(1), money(dec!(1))).with_order(-2),
        ];
        let calc = calculate_quote_totals(&items, TaxRate::standard()).unwrap();
        let orders: Vec<i32> = calc.items.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![7, 1, -2]);
    }

    #[test]
    fn test_fractional_quantities() {
        let items = vec![LineItemInput::new("Hours", dec!(1.5), money(dec!(60)))];
        let calc = calculate_invoice_totals(&items, TaxRate::zero()).unwrap();
        assert_eq!(calc.totals.total_amount, money(dec!(90)));
    }

    #[test]
    fn test_line_overflow_is_an_error() {
        let items = vec![LineItemInput::new("Bulk", dec!(2), money(Decimal::MAX))];
        let err = calculate_invoice_totals(&items, TaxRate::standard()).unwrap_err();

        assert!(matches!(
            &err,
            CoreError::AmountOutOfRange { field } if field == "items[0].unitPrice"
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_tax_overflow_is_an_error() {
        let items = vec![LineItemInput::new("Bulk", dec!(1), money(Decimal::MAX))
            .with_tax_rate(TaxRate::new(dec!(2)))];
        let err = calculate_quote_totals(&items, TaxRate::standard()).unwrap_err();

        assert!(matches!(
            &err,
            CoreError::AmountOutOfRange { field } if field == "items[0].taxRate"
        ));
    }

    #[test]
    fn test_running_sum_overflow_is_an_error() {
        let half = money(Decimal::MAX / dec!(2));
        let items = vec![
            LineItemInput::new("a", dec!(1), half),
            LineItemInput::new("b", dec!(1), half),
            LineItemInput::new("c", dec!(1), half),
        ];
        let err = calculate_totals(&items, TaxRate::zero(), TaxPolicy::ExplicitRateOnly).unwrap_err();

        assert!(matches!(
            &err,
            CoreError::AmountOutOfRange { field } if field == "subtotal"
        ));
    }

    #[test]
    fn test_position_beyond_i32_is_rejected() {
        assert_eq!(position(3).unwrap(), 3);

        let index = i32::MAX as usize + 1;
        match position(index).unwrap_err() {
            CoreError::Validation(ValidationError::OutOfRange { field, .. }) => {
                assert_eq!(field, format!("items[{index}].order"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_remaining_due() {
        assert_eq!(remaining_due(money(dec!(100)), money(dec!(40))), money(dec!(60)));
        assert_eq!(remaining_due(money(dec!(100)), money(dec!(120))), Money::zero());
        assert!(is_settled(Money::zero()));
        assert!(!is_settled(money(dec!(0.01))));
    }

    // ── Property tests ──────────────────────────────────────────────────────

    fn arb_amount() -> impl Strategy<Value = Decimal> {
        (0u64..10_000_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
    }

    fn arb_quantity() -> impl Strategy<Value = Decimal> {
        (1u64..100_000u64).prop_map(|thousandths| Decimal::new(thousandths as i64, 3))
    }

    fn arb_rate() -> impl Strategy<Value = Option<TaxRate>> {
        prop::option::of((0u32..=30u32).prop_map(|pct| TaxRate::new(Decimal::new(pct as i64, 2))))
    }

    fn arb_tax_type() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::sample::select(vec!["IVA_18", "IVA_10", "EXEMPT", "NONE"]))
            .prop_map(|o| o.map(str::to_string))
    }

    fn arb_item() -> impl Strategy<Value = LineItemInput> {
        (arb_quantity(), arb_amount(), arb_amount(), arb_rate(), arb_tax_type()).prop_map(
            |(qty, price, discount, rate, tax_type)| LineItemInput {
                description: "item".to_string(),
                quantity: qty,
                unit_price: Money::new(price),
                discount: Some(Money::new(discount)),
                tax_rate: rate,
                tax_type,
                order: None,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_total_is_subtotal_plus_tax(items in prop::collection::vec(arb_item(), 1..20)) {
            for policy in [TaxPolicy::TaxTypeTable, TaxPolicy::ExplicitRateOnly] {
                let calc = calculate_totals(&items, TaxRate::standard(), policy).unwrap();
                prop_assert_eq!(
                    Some(calc.totals.total_amount),
                    calc.totals.subtotal.checked_add(calc.totals.tax_amount)
                );
                prop_assert!(!calc.totals.subtotal.is_negative());
                prop_assert_eq!(calc.totals.due_amount, calc.totals.total_amount);
            }
        }

        #[test]
        fn prop_over_discount_contributes_nothing(item in arb_item(), extra in 1u64..1_000_000u64) {
            let gross = item.unit_price.checked_mul(item.quantity).unwrap();
            let mut item = item;
            item.discount = gross.checked_add(Money::new(Decimal::new(extra as i64, 2)));

            let calc = calculate_invoice_totals(&[item], TaxRate::standard()).unwrap();
            prop_assert!(calc.totals.subtotal.is_zero());
            prop_assert!(calc.totals.total_amount.is_zero());
        }

        #[test]
        fn prop_deterministic(items in prop::collection::vec(arb_item(), 1..10)) {
            let a = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();
            let b = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
