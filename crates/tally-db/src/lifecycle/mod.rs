//! # Document Lifecycle
//!
//! Services that drive invoices and quotes through their status machines.
//! Each mutating call is one SQLite transaction; no document state is
//! cached between calls.
//!
//! - [`InvoiceService`] - create, update, payments, conversion from quotes, stats
//! - [`QuoteService`] - create, update, expiry, stats
//! - [`ServiceError`] / [`ApiError`] - error classes for the HTTP boundary

pub mod error;
pub mod invoice;
pub mod quote;

pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use invoice::InvoiceService;
pub use quote::QuoteService;
