//! # Line Item Storage
//!
//! Invoices and quotes store their items in structurally identical tables
//! (`invoice_items`, `quote_items`). This module holds the SQL for both.
//!
//! Items are owned by exactly one document and are only ever replaced
//! wholesale: delete by parent id, then insert the new set, inside the
//! caller's transaction.

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use tally_core::{CalculatedLineItem, DocumentLine, TaxType};

use super::{decimal, money, rate};
use crate::error::DbResult;

/// Which item table to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTable {
    Invoice,
    Quote,
}

impl LineTable {
    const fn table(self) -> &'static str {
        match self {
            LineTable::Invoice => "invoice_items",
            LineTable::Quote => "quote_items",
        }
    }

    const fn parent_column(self) -> &'static str {
        match self {
            LineTable::Invoice => "invoice_id",
            LineTable::Quote => "quote_id",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: String,
    document_id: String,
    description: String,
    quantity: String,
    unit_price: String,
    discount: String,
    tax_rate: String,
    tax_type: Option<String>,
    sort_order: i32,
    net_amount: String,
    tax_amount: String,
    total_price: String,
}

impl LineRow {
    fn into_line(self) -> DbResult<DocumentLine> {
        Ok(DocumentLine {
            id: self.id,
            document_id: self.document_id,
            line: CalculatedLineItem {
                description: self.description,
                quantity: decimal("quantity", &self.quantity)?,
                unit_price: money("unit_price", &self.unit_price)?,
                discount: money("discount", &self.discount)?,
                tax_rate: rate("tax_rate", &self.tax_rate)?,
                tax_type: self.tax_type.as_deref().and_then(TaxType::from_label),
                order: self.sort_order,
                net_amount: money("net_amount", &self.net_amount)?,
                tax_amount: money("tax_amount", &self.tax_amount)?,
                total_price: money("total_price", &self.total_price)?,
            },
        })
    }
}

/// Assigns fresh ids to calculated items for `document_id`.
pub fn to_document_lines(document_id: &str, items: Vec<CalculatedLineItem>) -> Vec<DocumentLine> {
    items
        .into_iter()
        .map(|line| DocumentLine {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            line,
        })
        .collect()
}

/// Loads a document's items in display order.
pub async fn fetch_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    document_id: &str,
) -> DbResult<Vec<DocumentLine>> {
    let sql = format!(
        r#"
        SELECT
            id, {parent} AS document_id, description, quantity, unit_price,
            discount, tax_rate, tax_type, sort_order,
            net_amount, tax_amount, total_price
        FROM {table}
        WHERE {parent} = ?1
        ORDER BY sort_order, rowid
        "#,
        parent = table.parent_column(),
        table = table.table(),
    );

    let rows: Vec<LineRow> = sqlx::query_as(&sql)
        .bind(document_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(LineRow::into_line).collect()
}

/// Inserts items. Each line's `document_id` names its parent.
pub async fn insert_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    lines: &[DocumentLine],
) -> DbResult<()> {
    let sql = format!(
        r#"
        INSERT INTO {table} (
            id, {parent}, description, quantity, unit_price,
            discount, tax_rate, tax_type, sort_order,
            net_amount, tax_amount, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        parent = table.parent_column(),
        table = table.table(),
    );

    for line in lines {
        let item = &line.line;
        sqlx::query(&sql)
            .bind(&line.id)
            .bind(&line.document_id)
            .bind(&item.description)
            .bind(item.quantity.to_string())
            .bind(item.unit_price.to_string())
            .bind(item.discount.to_string())
            .bind(item.tax_rate.to_string())
            .bind(item.tax_type.map(|t| t.label()))
            .bind(item.order)
            .bind(item.net_amount.to_string())
            .bind(item.tax_amount.to_string())
            .bind(item.total_price.to_string())
            .execute(&mut *conn)
            .await?;
    }

    debug!(table = table.table(), count = lines.len(), "Inserted line items");
    Ok(())
}

/// Deletes every item of a document. Returns the number removed.
pub async fn delete_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    document_id: &str,
) -> DbResult<u64> {
    let sql = format!(
        "DELETE FROM {table} WHERE {parent} = ?1",
        table = table.table(),
        parent = table.parent_column(),
    );

    let result = sqlx::query(&sql)
        .bind(document_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Replaces a document's items wholesale.
pub async fn replace_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    document_id: &str,
    lines: &[DocumentLine],
) -> DbResult<()> {
    let removed = delete_lines(conn, table, document_id).await?;
    insert_lines(conn, table, lines).await?;

    debug!(
        document_id = %document_id,
        removed,
        inserted = lines.len(),
        "Replaced line items"
    );
    Ok(())
}
