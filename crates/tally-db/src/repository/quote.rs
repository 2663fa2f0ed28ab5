//! # Quote Repository
//!
//! Database operations for quote headers and items. Quotes mirror invoices
//! without payments: same touch / find / replace / update pattern.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use tally_core::{
    DocumentLine, Quote, QuoteFilter, QuoteStats, QuoteStatus, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};

use super::line::{self, LineTable};
use super::{money, rate, sum_money};
use crate::error::DbResult;

const SELECT_QUOTE: &str = r#"
    SELECT
        id, number, status, client_id, project_id, created_by,
        tax_rate, subtotal, discount_amount, tax_amount, total_amount,
        valid_until, accepted_at, notes, created_at, updated_at
    FROM live_quotes
"#;

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: String,
    number: String,
    status: QuoteStatus,
    client_id: String,
    project_id: Option<String>,
    created_by: String,
    tax_rate: String,
    subtotal: String,
    discount_amount: String,
    tax_amount: String,
    total_amount: String,
    valid_until: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuoteRow {
    fn into_quote(self, items: Vec<DocumentLine>) -> DbResult<Quote> {
        Ok(Quote {
            tax_rate: rate("quotes.tax_rate", &self.tax_rate)?,
            subtotal: money("quotes.subtotal", &self.subtotal)?,
            discount_amount: money("quotes.discount_amount", &self.discount_amount)?,
            tax_amount: money("quotes.tax_amount", &self.tax_amount)?,
            total_amount: money("quotes.total_amount", &self.total_amount)?,
            id: self.id,
            number: self.number,
            status: self.status,
            client_id: self.client_id,
            project_id: self.project_id,
            created_by: self.created_by,
            valid_until: self.valid_until,
            accepted_at: self.accepted_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusCounts {
    total: i64,
    draft: i64,
    sent: i64,
    accepted: i64,
}

/// Repository for quote database operations.
#[derive(Debug, Clone)]
pub struct QuoteRepository {
    pool: SqlitePool,
}

impl QuoteRepository {
    /// Creates a new QuoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuoteRepository { pool }
    }

    /// Gets a live quote by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Quote>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_live(&mut conn, id).await
    }

    /// Lists live quotes, newest first.
    pub async fn list(&self, filter: &QuoteFilter) -> DbResult<Vec<Quote>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_QUOTE);
        query.push(" WHERE 1 = 1");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = &filter.client_id {
            query.push(" AND client_id = ").push_bind(client_id.clone());
        }
        query
            .push(" ORDER BY created_at DESC, number DESC LIMIT ")
            .push_bind(i64::from(limit));

        let mut conn = self.pool.acquire().await?;
        let rows = query
            .build_query_as::<QuoteRow>()
            .fetch_all(&mut *conn)
            .await?;

        debug!(count = rows.len(), "Listed quotes");

        let mut quotes = Vec::with_capacity(rows.len());
        for row in rows {
            quotes.push(Self::hydrate(&mut conn, row).await?);
        }
        Ok(quotes)
    }

    /// Dashboard figures over live quotes.
    pub async fn stats(&self) -> DbResult<QuoteStats> {
        let mut conn = self.pool.acquire().await?;

        let counts: StatusCounts = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'DRAFT' THEN 1 ELSE 0 END), 0) AS draft,
                COALESCE(SUM(CASE WHEN status = 'SENT' THEN 1 ELSE 0 END), 0) AS sent,
                COALESCE(SUM(CASE WHEN status = 'ACCEPTED' THEN 1 ELSE 0 END), 0) AS accepted
            FROM live_quotes
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        let accepted_totals: Vec<String> =
            sqlx::query_scalar("SELECT total_amount FROM live_quotes WHERE status = 'ACCEPTED'")
                .fetch_all(&mut *conn)
                .await?;

        Ok(QuoteStats {
            total_quotes: counts.total,
            draft_quotes: counts.draft,
            sent_quotes: counts.sent,
            accepted_quotes: counts.accepted,
            accepted_value: sum_money("quotes.total_amount", &accepted_totals)?,
        })
    }

    // =========================================================================
    // Connection-scoped operations (usable inside a transaction)
    // =========================================================================

    /// Takes the write lock on the quote row. `false` when no live quote matches.
    pub async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE quotes SET updated_at = updated_at
            WHERE id = (SELECT id FROM live_quotes WHERE id = ?1)
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads a live quote with its items.
    pub async fn find_live(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Quote>> {
        let sql = format!("{SELECT_QUOTE} WHERE id = ?1");
        let row: Option<QuoteRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::hydrate(conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Number of a live quote, for display on the invoices made from it.
    pub async fn number_of(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<String>> {
        let number: Option<String> =
            sqlx::query_scalar("SELECT number FROM live_quotes WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(number)
    }

    /// Inserts the header and its items.
    pub async fn insert(conn: &mut SqliteConnection, quote: &Quote) -> DbResult<()> {
        debug!(id = %quote.id, number = %quote.number, "Inserting quote");

        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, number, status, client_id, project_id, created_by,
                tax_rate, subtotal, discount_amount, tax_amount, total_amount,
                valid_until, accepted_at, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&quote.id)
        .bind(&quote.number)
        .bind(quote.status)
        .bind(&quote.client_id)
        .bind(&quote.project_id)
        .bind(&quote.created_by)
        .bind(quote.tax_rate.to_string())
        .bind(quote.subtotal.to_string())
        .bind(quote.discount_amount.to_string())
        .bind(quote.tax_amount.to_string())
        .bind(quote.total_amount.to_string())
        .bind(quote.valid_until)
        .bind(quote.accepted_at)
        .bind(&quote.notes)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&mut *conn)
        .await?;

        line::insert_lines(conn, LineTable::Quote, &quote.items).await
    }

    /// Replaces all items of a quote.
    pub async fn replace_items(
        conn: &mut SqliteConnection,
        quote_id: &str,
        items: &[DocumentLine],
    ) -> DbResult<()> {
        line::replace_lines(conn, LineTable::Quote, quote_id, items).await
    }

    /// Writes every mutable header column from `quote`.
    pub async fn update_header(conn: &mut SqliteConnection, quote: &Quote) -> DbResult<()> {
        debug!(id = %quote.id, status = %quote.status, "Updating quote header");

        sqlx::query(
            r#"
            UPDATE quotes SET
                status = ?2,
                project_id = ?3,
                tax_rate = ?4,
                subtotal = ?5,
                discount_amount = ?6,
                tax_amount = ?7,
                total_amount = ?8,
                valid_until = ?9,
                accepted_at = ?10,
                notes = ?11,
                updated_at = ?12
            WHERE id = (SELECT id FROM live_quotes WHERE id = ?1)
            "#,
        )
        .bind(&quote.id)
        .bind(quote.status)
        .bind(&quote.project_id)
        .bind(quote.tax_rate.to_string())
        .bind(quote.subtotal.to_string())
        .bind(quote.discount_amount.to_string())
        .bind(quote.tax_amount.to_string())
        .bind(quote.total_amount.to_string())
        .bind(quote.valid_until)
        .bind(quote.accepted_at)
        .bind(&quote.notes)
        .bind(quote.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Marks a live quote deleted. Returns `false` when none matched.
    pub async fn soft_delete(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE quotes SET deleted_at = ?2, updated_at = ?2
            WHERE id = (SELECT id FROM live_quotes WHERE id = ?1)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves every live quote in `from` whose validity ended before `now` to `to`.
    pub async fn set_status_where_valid_before(
        conn: &mut SqliteConnection,
        from: QuoteStatus,
        to: QuoteStatus,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quotes SET status = ?2, updated_at = ?3
            WHERE id IN (
                SELECT id FROM live_quotes WHERE status = ?1 AND valid_until < ?3
            )
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn hydrate(conn: &mut SqliteConnection, row: QuoteRow) -> DbResult<Quote> {
        let items = line::fetch_lines(conn, LineTable::Quote, &row.id).await?;
        row.into_quote(items)
    }
}
