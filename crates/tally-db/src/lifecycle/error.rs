//! # Lifecycle Error Types
//!
//! [`ServiceError`] unites business-rule failures from tally-core with
//! persistence failures from this crate. [`ApiError`] is the serializable
//! envelope the surrounding HTTP layer returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InvoiceService::add_payment(...)                                      │
//! │         │                                                               │
//! │         ├── CoreError::AmountOutOfRange ────┐                          │
//! │         │                                   ▼                          │
//! │         ├── DbError::QueryFailed ────► ServiceError ──► ApiError       │
//! │         │                                   │          { code,         │
//! │         ▼                                   │            message }     │
//! │      Success                           kind() → 400 / 404 / 500        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use tally_core::{CoreError, ErrorKind, ValidationError};

use crate::error::DbError;

/// Failure of a lifecycle operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule or input violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// Caller-visible class of this error.
    ///
    /// ```text
    /// Core(e)               → e.kind()
    /// Db(NotFound)          → NotFound
    /// Db(Validation)        → InvalidInput
    /// Db(anything else)     → Persistence
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(err) => err.kind(),
            ServiceError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            ServiceError::Db(DbError::Validation(_)) => ErrorKind::InvalidInput,
            ServiceError::Db(_) => ErrorKind::Persistence,
        }
    }

    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

/// Result type for lifecycle operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// API Envelope
// =============================================================================

/// Error body handed to the HTTP layer.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INVALID_TRANSITION",
///   "message": "Invoice cannot transition from PAID to DRAFT"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Document or client not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Status change not in the transition table (400)
    InvalidTransition,

    /// Business rule rejected the request (400)
    BusinessRule,

    /// Database operation failed (500)
    DatabaseError,
}

impl ErrorCode {
    /// HTTP status code for this error code.
    pub const fn status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::ValidationError | ErrorCode::InvalidTransition | ErrorCode::BusinessRule => {
                400
            }
            ErrorCode::DatabaseError => 500,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        self.code.status()
    }
}

/// Converts database errors to API errors.
///
/// Store internals are logged, never sent to the caller.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::Validation(e) => ApiError::validation(e.to_string()),
            DbError::UniqueViolation { field, value } => {
                tracing::error!(field = %field, value = %value, "Unique constraint violated");
                ApiError::new(ErrorCode::DatabaseError, "Duplicate record")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::DatabaseError, "Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::CorruptValue { column, reason } => {
                tracing::error!(column = %column, "Corrupt stored value: {}", reason);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InvoiceNotFound(_)
            | CoreError::QuoteNotFound(_)
            | CoreError::ClientNotFound(_) => ErrorCode::NotFound,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::EmptyLineItems
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::AmountOutOfRange { .. }
            | CoreError::InvalidDocumentNumber(_)
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::QuoteNotConvertible(_)
            | CoreError::InvoiceAlreadyExists(_) => ErrorCode::BusinessRule,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::Db(e) => e.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
