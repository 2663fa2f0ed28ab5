//! # tally-db: Persistence and Document Lifecycle for Tally
//!
//! This crate owns the SQLite store and the services that move invoices and
//! quotes through their lifecycles. Money math comes from tally-core; this
//! crate decides what is written, and in which transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (outside this workspace)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Lifecycle   │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │               │    │               │    │  (embedded)  │   │   │
//! │  │   │ InvoiceService│───►│ InvoiceRepo   │    │              │   │   │
//! │  │   │ QuoteService  │    │ QuoteRepo     │    │ 001_initial  │   │   │
//! │  │   │               │    │ PaymentRepo   │    │   _schema    │   │   │
//! │  │   │ one tx per op │    │ counter, line │    │              │   │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘   │   │
//! │  │           │ tally-core: calculator, status machines             │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration and request defaults
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - SQL per table (clients, invoices, quotes, payments, counters)
//! - [`lifecycle`] - Invoice and quote services, boundary error mapping
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, TallyConfig};
//!
//! let config = TallyConfig::from_env()?;
//! let db = Database::new(config.db_config())
//!     .await?
//!     .with_defaults(config.defaults);
//!
//! let invoice = db.invoices().create(request).await?;
//! db.invoices().add_payment(&invoice.invoice.id, payment).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DocumentDefaults, TallyConfig};
pub use error::{DbError, DbResult};
pub use lifecycle::{ApiError, ErrorCode, InvoiceService, QuoteService, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::client::ClientRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::payment::PaymentRepository;
pub use repository::quote::QuoteRepository;
