//! # tally-core: Pure Financial Logic for Tally
//!
//! This crate is the **heart** of Tally's invoicing engine. It contains the
//! totals calculator, the document state machines and the numbering format
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  HTTP layer (outside this repo)                 │   │
//! │  │      maps ErrorKind → 400 / 404 / 500, JSON framing             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tally-db (Document Lifecycle Manager)                  │   │
//! │  │   InvoiceService, QuoteService, repositories, migrations        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │calculator │  │  status   │  │   │
//! │  │   │  Invoice  │  │   Money   │  │  totals   │  │ Invoice/  │  │   │
//! │  │   │  Quote    │  │  TaxRate  │  │  per item │  │  Quote    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Invoice, Quote, Payment, line items, requests)
//! - [`money`] - Exact decimal `Money`
//! - [`tax`] - Tax rates and the tax-type table
//! - [`calculator`] - Totals Calculator
//! - [`status`] - Invoice and quote state machines
//! - [`numbering`] - `PREFIX-YYMM-NNNN` document numbers
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Decimal Money**: All monetary values are exact decimals, never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::calculator::calculate_invoice_totals;
//! use tally_core::{LineItemInput, Money, TaxRate};
//!
//! let items = vec![LineItemInput::new(
//!     "Consulting",
//!     Decimal::from(2),
//!     Money::new(Decimal::from(100)),
//! )];
//!
//! let calc = calculate_invoice_totals(&items, TaxRate::standard()).unwrap();
//! assert_eq!(calc.totals.total_amount.amount(), Decimal::from(236));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod error;
pub mod money;
pub mod numbering;
pub mod status;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use numbering::{DocumentKind, DocumentNumber};
pub use status::{DocumentStatus, InvoiceStatus, QuoteStatus, Transition};
pub use tax::{TaxRate, TaxType};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days until an invoice created from a quote falls due, unless overridden.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Days a new quote stays valid when no `validUntil` is given.
pub const DEFAULT_QUOTE_VALIDITY_DAYS: i64 = 30;

/// Maximum length of a line item description.
pub const MAX_LINE_DESCRIPTION: usize = 500;

/// Page size for list operations when the caller gives none.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Upper bound for list page sizes.
pub const MAX_LIST_LIMIT: u32 = 200;
