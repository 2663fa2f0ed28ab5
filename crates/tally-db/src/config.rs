//! # Configuration
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! ## Environment Variables
//! | Variable                    | Default      | Meaning                              |
//! |-----------------------------|--------------|--------------------------------------|
//! | `TALLY_DB_PATH`             | `./tally.db` | SQLite file                          |
//! | `TALLY_MAX_CONNECTIONS`     | `5`          | Pool size                            |
//! | `TALLY_DEFAULT_TAX_RATE`    | `0.18`       | Fraction used when a doc has no rate |
//! | `TALLY_DEFAULT_DUE_DAYS`    | `30`         | Due date for invoices from quotes    |
//! | `TALLY_QUOTE_VALIDITY_DAYS` | `30`         | `validUntil` for new quotes          |
//!
//! Day counts must lie in `0..=MAX_DEFAULT_DAYS`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tally_core::{
    CoreError, TaxRate, ValidationError, DEFAULT_DUE_DAYS, DEFAULT_QUOTE_VALIDITY_DAYS,
};

use crate::pool::DbConfig;

/// Upper bound for the day-count defaults (one hundred years).
pub const MAX_DEFAULT_DAYS: i64 = 36_500;

/// Defaults the lifecycle services apply when a request leaves a field out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDefaults {
    /// Document-level tax rate when the request carries none.
    pub tax_rate: TaxRate,
    /// Days from creation until an invoice converted from a quote falls due.
    pub due_days: i64,
    /// Days a new quote stays valid.
    pub quote_validity_days: i64,
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        DocumentDefaults {
            tax_rate: TaxRate::standard(),
            due_days: DEFAULT_DUE_DAYS,
            quote_validity_days: DEFAULT_QUOTE_VALIDITY_DAYS,
        }
    }
}

impl DocumentDefaults {
    /// Due date for an invoice converted at `now`.
    pub fn due_date_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
        days_after(now, self.due_days, "dueDays")
    }

    /// `validUntil` for a quote created at `now`.
    pub fn valid_until_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
        days_after(now, self.quote_validity_days, "quoteValidityDays")
    }
}

fn days_after(now: DateTime<Utc>, days: i64, field: &str) -> Result<DateTime<Utc>, CoreError> {
    if (0..=MAX_DEFAULT_DAYS).contains(&days) {
        if let Some(at) = Duration::try_days(days).and_then(|d| now.checked_add_signed(d)) {
            return Ok(at);
        }
    }
    Err(ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_DEFAULT_DAYS,
    }
    .into())
}

/// Tally configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Maximum pooled connections
    pub max_connections: u32,

    /// Request defaults for the lifecycle services
    pub defaults: DocumentDefaults,
}

impl TallyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TALLY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./tally.db"));

        let max_connections: u32 = parse_or(&lookup, "TALLY_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue("TALLY_MAX_CONNECTIONS".to_string()));
        }

        let tax_rate = match lookup("TALLY_DEFAULT_TAX_RATE") {
            Some(raw) => {
                let fraction = Decimal::from_str(raw.trim())
                    .map_err(|_| ConfigError::InvalidValue("TALLY_DEFAULT_TAX_RATE".to_string()))?;
                let rate = TaxRate::new(fraction);
                if rate.is_negative() {
                    return Err(ConfigError::InvalidValue("TALLY_DEFAULT_TAX_RATE".to_string()));
                }
                rate
            }
            None => TaxRate::standard(),
        };

        let due_days: i64 = parse_or(&lookup, "TALLY_DEFAULT_DUE_DAYS", DEFAULT_DUE_DAYS)?;
        let quote_validity_days: i64 =
            parse_or(&lookup, "TALLY_QUOTE_VALIDITY_DAYS", DEFAULT_QUOTE_VALIDITY_DAYS)?;
        if !(0..=MAX_DEFAULT_DAYS).contains(&due_days) {
            return Err(ConfigError::InvalidValue("TALLY_DEFAULT_DUE_DAYS".to_string()));
        }
        if !(0..=MAX_DEFAULT_DAYS).contains(&quote_validity_days) {
            return Err(ConfigError::InvalidValue("TALLY_QUOTE_VALIDITY_DAYS".to_string()));
        }

        Ok(TallyConfig {
            db_path,
            max_connections,
            defaults: DocumentDefaults {
                tax_rate,
                due_days,
                quote_validity_days,
            },
        })
    }

    /// Pool configuration for this config.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path).max_connections(self.max_connections)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
