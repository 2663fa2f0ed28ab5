//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Lifecycle service (InvoiceService::add_payment)                       │
//! │       │                                                                 │
//! │       │  let mut tx = pool.begin().await?;                             │
//! │       │  InvoiceRepository::touch(&mut tx, id)    ← takes write lock   │
//! │       │  InvoiceRepository::find_live(&mut tx, id)                     │
//! │       │  PaymentRepository::insert(&mut tx, &payment)                  │
//! │       │  InvoiceRepository::update_header(&mut tx, &invoice)           │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Connection-scoped functions take `&mut SqliteConnection`, so the      │
//! │  same SQL runs inside a transaction or on a plain pooled connection.   │
//! │  Pool-scoped methods (`&self`) are for standalone reads.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Soft Delete
//! Reads go through the `live_clients`, `live_quotes` and `live_invoices`
//! views. No query repeats the `deleted_at IS NULL` filter by hand.
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`](client::ClientRepository) - Client lookup
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice headers, items, stats
//! - [`QuoteRepository`](quote::QuoteRepository) - Quote headers, items, stats
//! - [`PaymentRepository`](payment::PaymentRepository) - Append-only payments
//! - [`counter`] - Per-month document number counters
//! - [`line`] - Line item storage shared by invoices and quotes

pub mod client;
pub mod counter;
pub mod invoice;
pub mod line;
pub mod payment;
pub mod quote;

use rust_decimal::Decimal;
use std::str::FromStr;

use tally_core::{Money, TaxRate};

use crate::error::{DbError, DbResult};

// =============================================================================
// Column Decoding
// =============================================================================
// Money, quantities and rates are stored as TEXT decimal strings.

pub(crate) fn money(column: &str, raw: &str) -> DbResult<Money> {
    Money::parse(column, raw).map_err(|e| DbError::corrupt(column, e))
}

pub(crate) fn decimal(column: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| DbError::corrupt(column, e))
}

pub(crate) fn rate(column: &str, raw: &str) -> DbResult<TaxRate> {
    decimal(column, raw).map(TaxRate::new)
}

/// Sums a column of stored money strings exactly.
pub(crate) fn sum_money(column: &str, values: &[String]) -> DbResult<Money> {
    values.iter().try_fold(Money::zero(), |acc, raw| {
        acc.checked_add(money(column, raw)?)
            .ok_or_else(|| DbError::corrupt(column, "sum exceeds the decimal range"))
    })
}
