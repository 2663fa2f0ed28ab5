//! # Invoice Repository
//!
//! Database operations for invoice headers, plus the reads that assemble a
//! full [`Invoice`] (items and payments).
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Row Lifecycle                             │
//! │                                                                         │
//! │  1. INSERT                                                             │
//! │     └── insert() → header + items, status DRAFT                        │
//! │                                                                         │
//! │  2. MUTATE (always inside a service transaction)                       │
//! │     └── touch()          → takes the write lock, proves row is live    │
//! │     └── find_live()      → current state, re-read every time           │
//! │     └── replace_items()  → delete all items, insert new set            │
//! │     └── update_header()  → status, totals, balances, dates             │
//! │                                                                         │
//! │  3. SOFT DELETE                                                        │
//! │     └── soft_delete() → deleted_at set; row vanishes from live_invoices│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use tally_core::{
    DocumentLine, Invoice, InvoiceFilter, InvoiceStats, InvoiceStatus, Payment,
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};

use super::line::{self, LineTable};
use super::payment::PaymentRepository;
use super::{money, rate, sum_money};
use crate::error::DbResult;

const SELECT_INVOICE: &str = r#"
    SELECT
        id, number, status, client_id, quote_id, project_id, created_by,
        tax_rate, subtotal, discount_amount, tax_amount, total_amount,
        paid_amount, due_amount, due_date, paid_at, notes,
        created_at, updated_at
    FROM live_invoices
"#;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    number: String,
    status: InvoiceStatus,
    client_id: String,
    quote_id: Option<String>,
    project_id: Option<String>,
    created_by: String,
    tax_rate: String,
    subtotal: String,
    discount_amount: String,
    tax_amount: String,
    total_amount: String,
    paid_amount: String,
    due_amount: String,
    due_date: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<DocumentLine>, payments: Vec<Payment>) -> DbResult<Invoice> {
        Ok(Invoice {
            tax_rate: rate("invoices.tax_rate", &self.tax_rate)?,
            subtotal: money("invoices.subtotal", &self.subtotal)?,
            discount_amount: money("invoices.discount_amount", &self.discount_amount)?,
            tax_amount: money("invoices.tax_amount", &self.tax_amount)?,
            total_amount: money("invoices.total_amount", &self.total_amount)?,
            paid_amount: money("invoices.paid_amount", &self.paid_amount)?,
            due_amount: money("invoices.due_amount", &self.due_amount)?,
            id: self.id,
            number: self.number,
            status: self.status,
            client_id: self.client_id,
            quote_id: self.quote_id,
            project_id: self.project_id,
            created_by: self.created_by,
            due_date: self.due_date,
            paid_at: self.paid_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
            payments,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusCounts {
    total: i64,
    paid: i64,
    draft: i64,
    overdue: i64,
}

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // =========================================================================
    // Pool-scoped reads
    // =========================================================================

    /// Gets a live invoice by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_live(&mut conn, id).await
    }

    /// Lists live invoices, newest first.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_INVOICE);
        query.push(" WHERE 1 = 1");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = &filter.client_id {
            query.push(" AND client_id = ").push_bind(client_id.clone());
        }
        if let Some(quote_id) = &filter.quote_id {
            query.push(" AND quote_id = ").push_bind(quote_id.clone());
        }
        query
            .push(" ORDER BY created_at DESC, number DESC LIMIT ")
            .push_bind(i64::from(limit));

        let mut conn = self.pool.acquire().await?;
        let rows = query
            .build_query_as::<InvoiceRow>()
            .fetch_all(&mut *conn)
            .await?;

        debug!(count = rows.len(), "Listed invoices");

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            invoices.push(Self::hydrate(&mut conn, row).await?);
        }
        Ok(invoices)
    }

    /// Dashboard figures over live invoices.
    ///
    /// Counts come from SQL; money sums are accumulated exactly in Rust.
    pub async fn stats(&self, now: DateTime<Utc>) -> DbResult<InvoiceStats> {
        let mut conn = self.pool.acquire().await?;

        let counts: StatusCounts = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'PAID' THEN 1 ELSE 0 END), 0) AS paid,
                COALESCE(SUM(CASE WHEN status = 'DRAFT' THEN 1 ELSE 0 END), 0) AS draft,
                COALESCE(SUM(
                    CASE WHEN status IN ('SENT', 'OVERDUE') AND due_date < ?1 THEN 1 ELSE 0 END
                ), 0) AS overdue
            FROM live_invoices
            "#,
        )
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        let paid_totals: Vec<String> =
            sqlx::query_scalar("SELECT total_amount FROM live_invoices WHERE status = 'PAID'")
                .fetch_all(&mut *conn)
                .await?;

        let open_dues: Vec<String> = sqlx::query_scalar(
            "SELECT due_amount FROM live_invoices WHERE status IN ('SENT', 'OVERDUE')",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(InvoiceStats {
            total_invoices: counts.total,
            paid_invoices: counts.paid,
            draft_invoices: counts.draft,
            overdue_invoices: counts.overdue,
            total_revenue: sum_money("invoices.total_amount", &paid_totals)?,
            outstanding_amount: sum_money("invoices.due_amount", &open_dues)?,
        })
    }

    // =========================================================================
    // Connection-scoped operations (usable inside a transaction)
    // =========================================================================

    /// Takes the write lock on the invoice row.
    ///
    /// First statement of every mutating transaction. Returns `false` when no
    /// live invoice has this id.
    pub async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET updated_at = updated_at
            WHERE id = (SELECT id FROM live_invoices WHERE id = ?1)
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads a live invoice with items and payments.
    pub async fn find_live(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("{SELECT_INVOICE} WHERE id = ?1");
        let row: Option<InvoiceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::hydrate(conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Id of the live invoice created from `quote_id`, if any.
    pub async fn find_id_by_quote(
        conn: &mut SqliteConnection,
        quote_id: &str,
    ) -> DbResult<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM live_invoices WHERE quote_id = ?1")
                .bind(quote_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(id)
    }

    /// Inserts the header and its items.
    pub async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, number = %invoice.number, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, number, status, client_id, quote_id, project_id, created_by,
                tax_rate, subtotal, discount_amount, tax_amount, total_amount,
                paid_amount, due_amount, due_date, paid_at, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17,
                ?18, ?19
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.number)
        .bind(invoice.status)
        .bind(&invoice.client_id)
        .bind(&invoice.quote_id)
        .bind(&invoice.project_id)
        .bind(&invoice.created_by)
        .bind(invoice.tax_rate.to_string())
        .bind(invoice.subtotal.to_string())
        .bind(invoice.discount_amount.to_string())
        .bind(invoice.tax_amount.to_string())
        .bind(invoice.total_amount.to_string())
        .bind(invoice.paid_amount.to_string())
        .bind(invoice.due_amount.to_string())
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        line::insert_lines(conn, LineTable::Invoice, &invoice.items).await
    }

    /// Replaces all items of an invoice.
    pub async fn replace_items(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        items: &[DocumentLine],
    ) -> DbResult<()> {
        line::replace_lines(conn, LineTable::Invoice, invoice_id, items).await
    }

    /// Writes every mutable header column from `invoice`.
    pub async fn update_header(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, status = %invoice.status, "Updating invoice header");

        sqlx::query(
            r#"
            UPDATE invoices SET
                status = ?2,
                project_id = ?3,
                tax_rate = ?4,
                subtotal = ?5,
                discount_amount = ?6,
                tax_amount = ?7,
                total_amount = ?8,
                paid_amount = ?9,
                due_amount = ?10,
                due_date = ?11,
                paid_at = ?12,
                notes = ?13,
                updated_at = ?14
            WHERE id = (SELECT id FROM live_invoices WHERE id = ?1)
            "#,
        )
        .bind(&invoice.id)
        .bind(invoice.status)
        .bind(&invoice.project_id)
        .bind(invoice.tax_rate.to_string())
        .bind(invoice.subtotal.to_string())
        .bind(invoice.discount_amount.to_string())
        .bind(invoice.tax_amount.to_string())
        .bind(invoice.total_amount.to_string())
        .bind(invoice.paid_amount.to_string())
        .bind(invoice.due_amount.to_string())
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(&invoice.notes)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Marks a live invoice deleted. Returns `false` when none matched.
    pub async fn soft_delete(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET deleted_at = ?2, updated_at = ?2
            WHERE id = (SELECT id FROM live_invoices WHERE id = ?1)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves every live invoice in `from` whose due date is before `now` to `to`.
    pub async fn set_status_where_due_before(
        conn: &mut SqliteConnection,
        from: InvoiceStatus,
        to: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET status = ?2, updated_at = ?3
            WHERE id IN (
                SELECT id FROM live_invoices WHERE status = ?1 AND due_date < ?3
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

    async fn hydrate(conn: &mut SqliteConnection, row: InvoiceRow) -> DbResult<Invoice> {
        let items = line::fetch_lines(conn, LineTable::Invoice, &row.id).await?;
        let payments = PaymentRepository::list_for_invoice(conn, &row.id).await?;
        row.into_invoice(items, payments)
    }
}
