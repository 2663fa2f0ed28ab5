//! # Payment Repository
//!
//! Payments are append-only: rows are inserted and read, never updated or
//! deleted. The invoice header carries the running `paid_amount`.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use tally_core::Payment;

use super::money;
use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    invoice_id: String,
    amount: String,
    method: String,
    transaction_ref: Option<String>,
    note: Option<String>,
    paid_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<Payment> {
        Ok(Payment {
            amount: money("payments.amount", &self.amount)?,
            id: self.id,
            invoice_id: self.invoice_id,
            method: self.method,
            transaction_ref: self.transaction_ref,
            note: self.note,
            paid_at: self.paid_at,
            created_at: self.created_at,
        })
    }
}

/// Payment SQL. All functions run on a caller-supplied connection.
pub struct PaymentRepository;

impl PaymentRepository {
    /// Records a payment.
    pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(
            invoice_id = %payment.invoice_id,
            amount = %payment.amount,
            method = %payment.method,
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, amount, method,
                transaction_ref, note, paid_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.amount.to_string())
        .bind(&payment.method)
        .bind(&payment.transaction_ref)
        .bind(&payment.note)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets all payments for an invoice, in insertion order.
    pub async fn list_for_invoice(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT
                id, invoice_id, amount, method,
                transaction_ref, note, paid_at, created_at
            FROM payments
            WHERE invoice_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }
}
