//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Invoice      │   │     Quote       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  number INV-…   │   │  number QTE-…   │   │  invoice_id     │       │
//! │  │  status         │   │  status         │   │  amount         │       │
//! │  │  totals + paid  │   │  totals         │   │  method         │       │
//! │  │  items, payments│   │  items          │   │  (append-only)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  LineItemInput ──calculator──► CalculatedLineItem ──store──► DocumentLine│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `number`: `INV-YYMM-NNNN` / `QTE-YYMM-NNNN` - human-readable, shown to clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::status::{InvoiceStatus, QuoteStatus};
use crate::tax::{TaxRate, TaxType};

/// Treats an explicit `null` list like a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// =============================================================================
// Line Items
// =============================================================================

/// A raw line item as submitted by a caller.
///
/// Numbers may arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub description: String,
    #[ts(type = "string")]
    pub quantity: Decimal,
    pub unit_price: Money,
    /// Absolute amount off this line.
    #[serde(default)]
    pub discount: Option<Money>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    /// Tax category label (`IVA_18`, `IVA_10`, `EXEMPT`); unknown labels are ignored.
    #[serde(default)]
    pub tax_type: Option<String>,
    /// Display position; defaults to the index in the submitted list.
    #[serde(default)]
    pub order: Option<i32>,
}

impl LineItemInput {
    /// Minimal item: quantity × unit price, default tax, no discount.
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Money) -> Self {
        LineItemInput {
            description: description.into(),
            quantity,
            unit_price,
            discount: None,
            tax_rate: None,
            tax_type: None,
            order: None,
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn with_tax_type(mut self, label: impl Into<String>) -> Self {
        self.tax_type = Some(label.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// A normalized line item with its computed amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedLineItem {
    pub description: String,
    #[ts(type = "string")]
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Money,
    /// Effective rate after tax-type / explicit / default resolution.
    pub tax_rate: TaxRate,
    pub tax_type: Option<TaxType>,
    pub order: i32,
    /// `max(quantity × unitPrice − discount, 0)`.
    pub net_amount: Money,
    pub tax_amount: Money,
    /// `netAmount + taxAmount`; never negative.
    pub total_price: Money,
}

/// A persisted line item, owned by exactly one invoice or quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub line: CalculatedLineItem,
}

// =============================================================================
// Totals
// =============================================================================

/// Document-level aggregates.
///
/// Invariant: `total_amount == subtotal + tax_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    /// Sum of per-item net amounts (discounts already subtracted).
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    /// Equals `total_amount` at calculation time.
    pub due_amount: Money,
}

/// Output of the totals calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub items: Vec<CalculatedLineItem>,
    pub totals: DocumentTotals,
}

// =============================================================================
// Client
// =============================================================================

/// A company the CRM bills. Only what the document engine needs to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice with its owned items and payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub status: InvoiceStatus,
    pub client_id: String,
    pub quote_id: Option<String>,
    pub project_id: Option<String>,
    pub created_by: String,
    /// Default rate applied to items without their own.
    pub tax_rate: TaxRate,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub due_amount: Money,
    #[ts(as = "String")]
    pub due_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Ordered by `order`.
    pub items: Vec<DocumentLine>,
    /// Insertion order; append-only.
    pub payments: Vec<Payment>,
}

impl Invoice {
    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            due_amount: self.due_amount,
        }
    }

    /// Sum of recorded payments.
    pub fn payments_total(&self) -> CoreResult<Money> {
        self.payments.iter().try_fold(Money::zero(), |acc, p| {
            acc.checked_add(p.amount)
                .ok_or_else(|| CoreError::amount_out_of_range("paidAmount"))
        })
    }
}

/// An invoice plus the records it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Option<Client>,
    pub quote_number: Option<String>,
}

/// Request to create an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub client_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<LineItemInput>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of an invoice.
///
/// `items`, when present, replaces the whole item list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    #[serde(default)]
    pub items: Option<Vec<LineItemInput>>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request to convert an accepted quote into an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceFromQuote {
    pub quote_id: String,
    pub created_by: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// List filter for invoices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<String>,
    pub quote_id: Option<String>,
    pub limit: Option<u32>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment recorded against an invoice. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub amount: Money,
    /// Free-form tag: "cash", "transfer", "stripe", ...
    pub method: String,
    /// External reference (gateway charge id, bank reference, ...).
    pub transaction_ref: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Request to record a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub amount: Money,
    pub method: String,
    #[serde(default)]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Defaults to the time the payment is recorded.
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn new(amount: Money, method: impl Into<String>) -> Self {
        NewPayment {
            amount,
            method: method.into(),
            transaction_ref: None,
            note: None,
            paid_at: None,
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A priced proposal that may later become one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub number: String,
    pub status: QuoteStatus,
    pub client_id: String,
    pub project_id: Option<String>,
    pub created_by: String,
    pub tax_rate: TaxRate,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    #[ts(as = "String")]
    pub valid_until: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub accepted_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub items: Vec<DocumentLine>,
}

impl Quote {
    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            due_amount: self.total_amount,
        }
    }
}

/// Request to create a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuote {
    pub client_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of a quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuote {
    #[serde(default)]
    pub items: Option<Vec<LineItemInput>>,
    #[serde(default)]
    pub status: Option<QuoteStatus>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<String>,
    pub limit: Option<u32>,
}

// =============================================================================
// Stats
// =============================================================================

/// Dashboard figures over live invoices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStats {
    pub total_invoices: i64,
    pub paid_invoices: i64,
    pub draft_invoices: i64,
    /// SENT or OVERDUE with a due date in the past.
    pub overdue_invoices: i64,
    /// Sum of `totalAmount` over PAID invoices.
    pub total_revenue: Money,
    /// Sum of `dueAmount` over SENT and OVERDUE invoices.
    pub outstanding_amount: Money,
}

/// Dashboard figures over live quotes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuoteStats {
    pub total_quotes: i64,
    pub draft_quotes: i64,
    pub sent_quotes: i64,
    pub accepted_quotes: i64,
    /// Sum of `totalAmount` over ACCEPTED quotes.
    pub accepted_value: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_item_input_coerces_numbers() {
        let json = r#"{
            "description": "Consulting",
            "quantity": "2",
            "unitPrice": 100,
            "discount": "10.5",
            "taxType": "IVA_10"
        }"#;
        let item: LineItemInput = serde_json::from_str(json).unwrap();
        assert_eq!(item.quantity, dec!(2));
        assert_eq!(item.unit_price, Money::new(dec!(100)));
        assert_eq!(item.discount, Some(Money::new(dec!(10.5))));
        assert_eq!(item.tax_type.as_deref(), Some("IVA_10"));
        assert_eq!(item.order, None);
    }

    #[test]
    fn test_null_items_deserialize_as_empty() {
        let json = r#"{
            "clientId": "c1",
            "items": null,
            "dueDate": "2026-11-15T00:00:00Z",
            "createdBy": "u1"
        }"#;
        let req: CreateInvoice = serde_json::from_str(json).unwrap();
        assert!(req.items.is_empty());

        let missing = r#"{"clientId": "c1", "dueDate": "2026-11-15T00:00:00Z", "createdBy": "u1"}"#;
        let req: CreateInvoice = serde_json::from_str(missing).unwrap();
        assert!(req.items.is_empty());
    }

    #[test]
    fn test_document_line_flattens_calculated_fields() {
        let line = DocumentLine {
            id: "l1".into(),
            document_id: "d1".into(),
            line: CalculatedLineItem {
                description: "Widget".into(),
                quantity: dec!(1),
                unit_price: Money::new(dec!(50)),
                discount: Money::new(dec!(10)),
                tax_rate: TaxRate::new(dec!(0.18)),
                tax_type: None,
                order: 0,
                net_amount: Money::new(dec!(40)),
                tax_amount: Money::new(dec!(7.2)),
                total_price: Money::new(dec!(47.2)),
            },
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["documentId"], "d1");
        assert_eq!(value["totalPrice"], "47.2");
    }
}
