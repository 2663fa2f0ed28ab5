//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError for lifecycle operations   │
//! │                                                                         │
//! │  Every error reports an ErrorKind → HTTP status class at the boundary  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, statuses)
//! 3. Errors are enum variants, never String
//! 4. Each variant maps to exactly one [`ErrorKind`]

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-visible error class.
///
/// The surrounding HTTP layer maps these to response codes without having to
/// know about individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller-correctable input problem (400).
    InvalidInput,
    /// Referenced document missing or soft-deleted (404).
    NotFound,
    /// Status change not permitted from the current status (400).
    InvalidTransition,
    /// Store failure, not recovered locally (500).
    Persistence,
}

impl ErrorKind {
    /// HTTP status code for this class.
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput | ErrorKind::InvalidTransition => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Persistence => 500,
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A document was submitted without line items.
    ///
    /// ## When This Occurs
    /// - `items` is `[]`
    /// - `items` was `null` / missing in the request body
    #[error("A document must have at least one line item")]
    EmptyLineItems,

    /// Invoice cannot be found (missing or soft-deleted).
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Quote cannot be found (missing or soft-deleted).
    #[error("Quote not found: {0}")]
    QuoteNotFound(String),

    /// Referenced client cannot be found.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Status change is not in the transition table.
    ///
    /// ## User Workflow
    /// ```text
    /// updateStatus(inv, DRAFT)   (current: PAID)
    ///      │
    ///      ▼
    /// PAID → DRAFT not allowed
    ///      │
    ///      ▼
    /// InvalidTransition { entity: "Invoice", from: "PAID", to: "DRAFT" }
    /// ```
    #[error("{entity} cannot transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Quote is missing or not ACCEPTED, so it cannot become an invoice.
    #[error("Quote {0} is not accepted or does not exist")]
    QuoteNotConvertible(String),

    /// An invoice already references this quote.
    #[error("An invoice already exists for quote {0}")]
    InvoiceAlreadyExists(String),

    /// A computed amount left the range `Decimal` can represent.
    ///
    /// Inputs pass validation one field at a time; this is the failure for
    /// products and sums of valid fields that still overflow.
    #[error("{field} is out of range")]
    AmountOutOfRange { field: String },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A string does not follow `PREFIX-YYMM-NNNN`.
    #[error("Invalid document number: {0}")]
    InvalidDocumentNumber(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidTransition error for a given entity.
    pub fn invalid_transition(
        entity: &'static str,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn amount_out_of_range(field: impl Into<String>) -> Self {
        CoreError::AmountOutOfRange {
            field: field.into(),
        }
    }

    /// Returns the caller-visible class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvoiceNotFound(_)
            | CoreError::QuoteNotFound(_)
            | CoreError::ClientNotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::EmptyLineItems
            | CoreError::QuoteNotConvertible(_)
            | CoreError::InvoiceAlreadyExists(_)
            | CoreError::AmountOutOfRange { .. }
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::InvalidDocumentNumber(_)
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
