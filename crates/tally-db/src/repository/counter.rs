//! # Document Counters
//!
//! Atomic per-month sequence for document numbers.
//!
//! ```text
//! document_counters
//! ┌─────────┬────────┬────────────┐
//! │ kind    │ period │ last_value │
//! ├─────────┼────────┼────────────┤
//! │ invoice │ 2610   │ 42         │  → next invoice this month: INV-2610-0043
//! │ quote   │ 2610   │ 7          │
//! │ invoice │ 2611   │ 1          │  ← new month, new row, starts at 1
//! └─────────┴────────┴────────────┘
//! ```
//!
//! The increment is a single upsert with `RETURNING`, run inside the creating
//! transaction: a rolled-back create also rolls back its number.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use tally_core::numbering::{period_key, DocumentKind, DocumentNumber};

use crate::error::{DbError, DbResult};

/// Increments and returns the counter for `kind` in `period`.
pub async fn next_sequence(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    period: &str,
) -> DbResult<u32> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_counters (kind, period, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (kind, period) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.as_str())
    .bind(period)
    .fetch_one(&mut *conn)
    .await?;

    u32::try_from(value).map_err(|e| DbError::corrupt("document_counters.last_value", e))
}

/// Issues the next document number for the month containing `at`.
pub async fn next_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    at: DateTime<Utc>,
) -> DbResult<String> {
    let period = period_key(at);
    let sequence = next_sequence(conn, kind, &period).await?;
    let number = DocumentNumber::new(kind, at, sequence).to_string();

    debug!(kind = kind.as_str(), number = %number, "Issued document number");
    Ok(number)
}
