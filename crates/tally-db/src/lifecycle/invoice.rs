//! # Invoice Lifecycle
//!
//! Every operation that changes an invoice runs in one SQLite transaction:
//!
//! ```text
//! begin
//!   │
//!   ├── first statement is a write (touch / counter upsert)
//!   │     → the transaction holds the write lock from here on
//!   ├── re-read current state (no caching between calls)
//!   ├── validate (transition table, payment rules)
//!   ├── write items / payment / header
//!   │
//! commit   (any error before this point drops the tx → rollback)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::calculator::{calculate_invoice_totals, is_settled, remaining_due};
use tally_core::validation::{validate_payment_amount, validate_payment_method};
use tally_core::{
    CoreError, CreateInvoice, CreateInvoiceFromQuote, DocumentKind, DocumentStatus, Invoice,
    InvoiceDetail, InvoiceFilter, InvoiceStats, InvoiceStatus, Money, NewPayment, Payment,
    QuoteStatus, Transition, UpdateInvoice,
};

use super::error::ServiceResult;
use crate::config::DocumentDefaults;
use crate::error::DbResult;
use crate::repository::client::ClientRepository;
use crate::repository::counter;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::line::to_document_lines;
use crate::repository::payment::PaymentRepository;
use crate::repository::quote::QuoteRepository;

/// Invoice lifecycle operations.
#[derive(Debug, Clone)]
pub struct InvoiceService {
    pool: SqlitePool,
    defaults: DocumentDefaults,
}

impl InvoiceService {
    pub fn new(pool: SqlitePool, defaults: DocumentDefaults) -> Self {
        InvoiceService { pool, defaults }
    }

    fn repository(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Creates a DRAFT invoice with a fresh number.
    ///
    /// Totals are calculated before any I/O, so an empty item list fails
    /// without touching the store.
    pub async fn create(&self, input: CreateInvoice) -> ServiceResult<InvoiceDetail> {
        let tax_rate = input.tax_rate.unwrap_or(self.defaults.tax_rate);
        let calc = calculate_invoice_totals(&input.items, tax_rate)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let number = counter::next_number(&mut tx, DocumentKind::Invoice, now).await?;

        let client = ClientRepository::find_live(&mut tx, &input.client_id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(input.client_id.clone()))?;

        let quote_number = match &input.quote_id {
            Some(quote_id) => {
                let number = QuoteRepository::number_of(&mut tx, quote_id)
                    .await?
                    .ok_or_else(|| CoreError::QuoteNotFound(quote_id.clone()))?;
                if InvoiceRepository::find_id_by_quote(&mut tx, quote_id)
                    .await?
                    .is_some()
                {
                    return Err(CoreError::InvoiceAlreadyExists(quote_id.clone()).into());
                }
                Some(number)
            }
            None => None,
        };

        let id = Uuid::new_v4().to_string();
        let totals = calc.totals;
        let invoice = Invoice {
            items: to_document_lines(&id, calc.items),
            id,
            number,
            status: InvoiceStatus::Draft,
            client_id: client.id.clone(),
            quote_id: input.quote_id,
            project_id: input.project_id,
            created_by: input.created_by,
            tax_rate,
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            paid_amount: Money::zero(),
            due_amount: totals.due_amount,
            due_date: input.due_date,
            paid_at: None,
            notes: input.notes,
            created_at: now,
            updated_at: now,
            payments: Vec::new(),
        };

        InvoiceRepository::insert(&mut tx, &invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            total = %invoice.total_amount,
            items = invoice.items.len(),
            "Invoice created"
        );

        Ok(InvoiceDetail {
            invoice,
            client: Some(client),
            quote_number,
        })
    }

    /// Gets a live invoice with its client and originating quote number.
    pub async fn get(&self, id: &str) -> ServiceResult<InvoiceDetail> {
        let mut conn = self.pool.acquire().await?;
        let invoice = InvoiceRepository::find_live(&mut conn, id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(id.to_string()))?;
        Ok(detail(&mut conn, invoice).await?)
    }

    /// Lists live invoices, newest first.
    pub async fn list(&self, filter: &InvoiceFilter) -> ServiceResult<Vec<Invoice>> {
        Ok(self.repository().list(filter).await?)
    }

    /// Applies a partial update.
    ///
    /// A requested status change is validated before anything else is
    /// applied; a rejected transition leaves the invoice untouched. A new
    /// item list replaces the old one wholesale and recomputes the totals,
    /// with `due = total − paid`.
    pub async fn update(&self, id: &str, patch: UpdateInvoice) -> ServiceResult<InvoiceDetail> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = lock_invoice(&mut tx, id).await?;

        let transition = match patch.status {
            Some(to) => checked_transition(&invoice, to)?,
            None => Transition::Unchanged,
        };

        let now = Utc::now();

        if let Some(rate) = patch.tax_rate {
            invoice.tax_rate = rate;
        }

        if let Some(items) = &patch.items {
            let calc = calculate_invoice_totals(items, invoice.tax_rate)?;
            let lines = to_document_lines(&invoice.id, calc.items);
            InvoiceRepository::replace_items(&mut tx, &invoice.id, &lines).await?;

            invoice.items = lines;
            invoice.subtotal = calc.totals.subtotal;
            invoice.discount_amount = calc.totals.discount_amount;
            invoice.tax_amount = calc.totals.tax_amount;
            invoice.total_amount = calc.totals.total_amount;
            invoice.due_amount = invoice
                .total_amount
                .checked_sub(invoice.paid_amount)
                .ok_or_else(|| CoreError::amount_out_of_range("dueAmount"))?;

            debug!(invoice_id = %invoice.id, items = invoice.items.len(), "Items replaced");
        }

        if let Some(due_date) = patch.due_date {
            invoice.due_date = due_date;
        }
        if let Some(project_id) = patch.project_id {
            invoice.project_id = Some(project_id);
        }
        if let Some(notes) = patch.notes {
            invoice.notes = Some(notes);
        }

        apply_transition(&mut invoice, transition, now)?;
        invoice.updated_at = now;

        InvoiceRepository::update_header(&mut tx, &invoice).await?;
        let detail = detail(&mut tx, invoice).await?;
        tx.commit().await?;

        info!(invoice_id = %id, status = %detail.invoice.status, "Invoice updated");
        Ok(detail)
    }

    /// Moves an invoice to `status` through the transition table.
    ///
    /// Re-applying the current status is a successful no-op.
    pub async fn update_status(&self, id: &str, status: InvoiceStatus) -> ServiceResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = lock_invoice(&mut tx, id).await?;

        let transition = checked_transition(&invoice, status)?;
        if !transition.is_change() {
            tx.commit().await?;
            debug!(invoice_id = %id, status = %status, "Status unchanged");
            return Ok(invoice);
        }

        let now = Utc::now();
        apply_transition(&mut invoice, transition, now)?;
        invoice.updated_at = now;

        InvoiceRepository::update_header(&mut tx, &invoice).await?;
        tx.commit().await?;

        if let Transition::Changed { from, to } = transition {
            info!(invoice_id = %id, from = %from, to = %to, "Invoice status changed");
        }
        Ok(invoice)
    }

    /// Records a payment and rebalances the invoice.
    ///
    /// `paid += amount`, `due = max(total − paid, 0)`. Payments are recorded
    /// in every status. When due reaches zero and the status allows payment
    /// completion, the invoice moves to PAID outside the regular transition
    /// table; a CANCELLED or REFUNDED invoice keeps its status. Payment row,
    /// balances and any status flip commit together.
    pub async fn add_payment(
        &self,
        invoice_id: &str,
        payment: NewPayment,
    ) -> ServiceResult<InvoiceDetail> {
        validate_payment_amount(payment.amount).map_err(|e| CoreError::InvalidPaymentAmount {
            reason: e.to_string(),
        })?;
        let method = validate_payment_method(&payment.method)?;

        let mut tx = self.pool.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;

        let paid_amount = invoice
            .paid_amount
            .checked_add(payment.amount)
            .ok_or_else(|| CoreError::amount_out_of_range("paidAmount"))?;

        let now = Utc::now();
        let record = Payment {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice.id.clone(),
            amount: payment.amount,
            method,
            transaction_ref: payment.transaction_ref,
            note: payment.note,
            paid_at: payment.paid_at.unwrap_or(now),
            created_at: now,
        };
        PaymentRepository::insert(&mut tx, &record).await?;

        invoice.paid_amount = paid_amount;
        invoice.due_amount = remaining_due(invoice.total_amount, invoice.paid_amount);
        invoice.payments.push(record);

        let completed = is_settled(invoice.due_amount)
            && invoice.status != InvoiceStatus::Paid
            && invoice.status.can_complete_by_payment();
        if completed {
            invoice.status = InvoiceStatus::Paid;
            invoice.paid_at = Some(now);
        }
        invoice.updated_at = now;

        InvoiceRepository::update_header(&mut tx, &invoice).await?;
        let detail = detail(&mut tx, invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice_id,
            amount = %payment.amount,
            paid = %detail.invoice.paid_amount,
            due = %detail.invoice.due_amount,
            "Payment recorded"
        );
        if completed {
            info!(invoice_id = %invoice_id, "Invoice paid in full");
        } else if !detail.invoice.status.can_complete_by_payment() {
            warn!(
                invoice_id = %invoice_id,
                status = %detail.invoice.status,
                "Payment recorded on a closed invoice"
            );
        }

        Ok(detail)
    }

    /// Converts an ACCEPTED quote into a new DRAFT invoice.
    ///
    /// Items and totals are copied as stored on the quote, never recomputed.
    /// A quote backs at most one live invoice.
    pub async fn create_from_quote(
        &self,
        input: CreateInvoiceFromQuote,
    ) -> ServiceResult<InvoiceDetail> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let number = counter::next_number(&mut tx, DocumentKind::Invoice, now).await?;

        let quote = QuoteRepository::find_live(&mut tx, &input.quote_id)
            .await?
            .filter(|q| q.status == QuoteStatus::Accepted)
            .ok_or_else(|| CoreError::QuoteNotConvertible(input.quote_id.clone()))?;

        if InvoiceRepository::find_id_by_quote(&mut tx, &quote.id)
            .await?
            .is_some()
        {
            warn!(quote_id = %quote.id, "Quote already invoiced");
            return Err(CoreError::InvoiceAlreadyExists(quote.id.clone()).into());
        }

        let client = ClientRepository::find_live(&mut tx, &quote.client_id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(quote.client_id.clone()))?;

        let due_date = match input.due_date {
            Some(due_date) => due_date,
            None => self.defaults.due_date_from(now)?,
        };

        let id = Uuid::new_v4().to_string();
        let copied: Vec<_> = quote.items.iter().map(|l| l.line.clone()).collect();
        let invoice = Invoice {
            items: to_document_lines(&id, copied),
            id,
            number,
            status: InvoiceStatus::Draft,
            client_id: quote.client_id.clone(),
            quote_id: Some(quote.id.clone()),
            project_id: input.project_id.or(quote.project_id),
            created_by: input.created_by,
            tax_rate: quote.tax_rate,
            subtotal: quote.subtotal,
            discount_amount: quote.discount_amount,
            tax_amount: quote.tax_amount,
            total_amount: quote.total_amount,
            paid_amount: Money::zero(),
            due_amount: quote.total_amount,
            due_date,
            paid_at: None,
            notes: quote.notes,
            created_at: now,
            updated_at: now,
            payments: Vec::new(),
        };

        InvoiceRepository::insert(&mut tx, &invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            quote_id = %quote.id,
            "Invoice created from quote"
        );

        Ok(InvoiceDetail {
            invoice,
            client: Some(client),
            quote_number: Some(quote.number),
        })
    }

    /// Reserves the next invoice number for the current month.
    pub async fn generate_number(&self) -> ServiceResult<String> {
        let mut tx = self.pool.begin().await?;
        let number = counter::next_number(&mut tx, DocumentKind::Invoice, Utc::now()).await?;
        tx.commit().await?;
        Ok(number)
    }

    /// Dashboard figures, with "overdue" evaluated at `now`.
    pub async fn get_stats(&self, now: DateTime<Utc>) -> ServiceResult<InvoiceStats> {
        Ok(self.repository().stats(now).await?)
    }

    /// Soft-deletes an invoice. Its quote becomes convertible again.
    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        if !InvoiceRepository::soft_delete(&mut tx, id, Utc::now()).await? {
            return Err(CoreError::InvoiceNotFound(id.to_string()).into());
        }
        tx.commit().await?;

        info!(invoice_id = %id, "Invoice removed");
        Ok(())
    }

    /// Payments of a live invoice, in the order they were recorded.
    pub async fn list_payments(&self, invoice_id: &str) -> ServiceResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        let invoice = InvoiceRepository::find_live(&mut conn, invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound(invoice_id.to_string()))?;
        Ok(invoice.payments)
    }

    /// Moves every SENT invoice due before `now` to OVERDUE.
    ///
    /// Returns the number of invoices moved.
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        InvoiceStatus::Sent.transition_to(InvoiceStatus::Overdue)?;

        let mut tx = self.pool.begin().await?;
        let moved = InvoiceRepository::set_status_where_due_before(
            &mut tx,
            InvoiceStatus::Sent,
            InvoiceStatus::Overdue,
            now,
        )
        .await?;
        tx.commit().await?;

        if moved > 0 {
            info!(count = moved, "Invoices marked overdue");
        }
        Ok(moved)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Takes the write lock and loads the current state.
async fn lock_invoice(conn: &mut SqliteConnection, id: &str) -> ServiceResult<Invoice> {
    if !InvoiceRepository::touch(conn, id).await? {
        return Err(CoreError::InvoiceNotFound(id.to_string()).into());
    }
    let invoice = InvoiceRepository::find_live(conn, id)
        .await?
        .ok_or_else(|| CoreError::InvoiceNotFound(id.to_string()))?;
    Ok(invoice)
}

fn checked_transition(
    invoice: &Invoice,
    to: InvoiceStatus,
) -> ServiceResult<Transition<InvoiceStatus>> {
    match invoice.status.transition_to(to) {
        Ok(transition) => Ok(transition),
        Err(err) => {
            warn!(
                invoice_id = %invoice.id,
                from = %invoice.status,
                to = %to,
                "Invoice transition rejected"
            );
            Err(err.into())
        }
    }
}

/// Entering PAID stamps `paid_at` and settles `due` against the payments.
fn apply_transition(
    invoice: &mut Invoice,
    transition: Transition<InvoiceStatus>,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    if let Transition::Changed { to, .. } = transition {
        invoice.status = to;
        if to.stamps_paid_at() {
            invoice.paid_at = Some(now);
            invoice.due_amount = remaining_due(invoice.total_amount, invoice.payments_total()?);
        }
    }
    Ok(())
}

async fn detail(conn: &mut SqliteConnection, invoice: Invoice) -> DbResult<InvoiceDetail> {
    let client = ClientRepository::find_live(conn, &invoice.client_id).await?;
    let quote_number = match &invoice.quote_id {
        Some(quote_id) => QuoteRepository::number_of(conn, quote_id).await?,
        None => None,
    };
    Ok(InvoiceDetail {
        invoice,
        client,
        quote_number,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::error::ServiceError;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use tally_core::numbering::DocumentNumber;
    use tally_core::{
        Client, CreateQuote, ErrorKind, LineItemInput, NewClient, TaxRate, UpdateQuote,
    };

    async fn setup() -> (Database, Client) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let client = db
            .clients()
            .create(NewClient {
                name: "Acme Corp".to_string(),
                email: Some("billing@acme.test".to_string()),
            })
            .await
            .unwrap();
        (db, client)
    }

    fn reference_items() -> Vec<LineItemInput> {
        vec![
            LineItemInput::new("Licence", dec!(2), Money::new(dec!(100)))
                .with_tax_rate(TaxRate::new(dec!(0.18))),
            LineItemInput::new("Setup", dec!(1), Money::new(dec!(50)))
                .with_discount(Money::new(dec!(10)))
                .with_tax_rate(TaxRate::new(dec!(0.18))),
        ]
    }

    fn new_invoice(client: &Client, items: Vec<LineItemInput>) -> CreateInvoice {
        CreateInvoice {
            client_id: client.id.clone(),
            items,
            due_date: Utc::now() + Duration::days(14),
            tax_rate: None,
            quote_id: None,
            project_id: None,
            created_by: "user-1".to_string(),
            notes: None,
        }
    }

    async fn accepted_quote(db: &Database, client: &Client) -> tally_core::Quote {
        let quote = db
            .quotes()
            .create(CreateQuote {
                client_id: client.id.clone(),
                items: reference_items(),
                valid_until: None,
                tax_rate: None,
                project_id: Some("proj-7".to_string()),
                created_by: "user-1".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        db.quotes()
            .update_status(&quote.id, QuoteStatus::Sent)
            .await
            .unwrap();
        db.quotes()
            .update_status(&quote.id, QuoteStatus::Accepted)
            .await
            .unwrap()
    }

    fn kind(err: ServiceError) -> ErrorKind {
        err.kind()
    }

    #[tokio::test]
    async fn test_create_computes_reference_totals() {
        let (db, client) = setup().await;

        let detail = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap();
        let invoice = &detail.invoice;

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.subtotal, Money::new(dec!(240)));
        assert_eq!(invoice.discount_amount, Money::new(dec!(10)));
        assert_eq!(invoice.tax_amount, Money::new(dec!(43.2)));
        assert_eq!(invoice.total_amount, Money::new(dec!(283.2)));
        assert_eq!(invoice.due_amount, invoice.total_amount);
        assert!(invoice.paid_amount.is_zero());
        assert_eq!(invoice.items[0].line.total_price, Money::new(dec!(236)));
        assert_eq!(invoice.items[1].line.total_price, Money::new(dec!(47.2)));
        assert_eq!(detail.client.as_ref().map(|c| c.id.as_str()), Some(client.id.as_str()));

        let number = DocumentNumber::parse(&invoice.number).unwrap();
        assert_eq!(number.kind, DocumentKind::Invoice);
        assert_eq!(number.sequence, 1);

        // Re-read from the store
        let stored = db.invoices().get(&invoice.id).await.unwrap().invoice;
        assert_eq!(stored.total_amount, Money::new(dec!(283.2)));
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].line.description, "Licence");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_items() {
        let (db, client) = setup().await;

        let err = db
            .invoices()
            .create(new_invoice(&client, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::EmptyLineItems)));
        assert_eq!(kind(err), ErrorKind::InvalidInput);

        // Nothing consumed a number
        let detail = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap();
        assert!(detail.invoice.number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_create_requires_live_client() {
        let (db, client) = setup().await;
        let mut input = new_invoice(&client, reference_items());
        input.client_id = "missing".to_string();

        let err = db.invoices().create(input).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);

        db.clients().remove(&client.id).await.unwrap();
        let err = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let (db, client) = setup().await;

        let first = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap();
        let reserved = db.invoices().generate_number().await.unwrap();
        let second = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap();

        assert!(first.invoice.number.ends_with("-0001"));
        assert!(reserved.ends_with("-0002"));
        assert!(second.invoice.number.ends_with("-0003"));
        assert!(reserved.starts_with("INV-"));
    }

    #[tokio::test]
    async fn test_update_status_is_idempotent() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        let sent = db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);

        let before = db.invoices().get(&id).await.unwrap();
        db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();
        db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();
        let after = db.invoices().get(&id).await.unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_paid_to_draft_is_rejected() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();
        let paid = db.invoices().update_status(&id, InvoiceStatus::Paid).await.unwrap();
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.due_amount, Money::new(dec!(283.2)));

        let err = db
            .invoices()
            .update_status(&id, InvoiceStatus::Draft)
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::InvalidTransition);

        let stored = db.invoices().get(&id).await.unwrap().invoice;
        assert_eq!(stored.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_full_payment_completes_invoice() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;
        db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();

        let partial = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(83.2)), "transfer"))
            .await
            .unwrap();
        assert_eq!(partial.invoice.status, InvoiceStatus::Sent);
        assert_eq!(partial.invoice.due_amount, Money::new(dec!(200)));

        let done = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(200)), "cash"))
            .await
            .unwrap();
        assert_eq!(done.invoice.status, InvoiceStatus::Paid);
        assert!(done.invoice.due_amount.is_zero());
        assert_eq!(done.invoice.paid_amount, Money::new(dec!(283.2)));
        assert!(done.invoice.paid_at.is_some());

        let payments = db.invoices().list_payments(&id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].method, "transfer");
        assert_eq!(payments[1].method, "cash");
    }

    #[tokio::test]
    async fn test_overpayment_clamps_due_on_draft() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        let detail = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(300)), "card"))
            .await
            .unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
        assert!(detail.invoice.due_amount.is_zero());
        assert_eq!(detail.invoice.paid_amount, Money::new(dec!(300)));
    }

    #[tokio::test]
    async fn test_payment_on_cancelled_is_recorded_without_completion() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;
        db.invoices()
            .update_status(&id, InvoiceStatus::Cancelled)
            .await
            .unwrap();

        let detail = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(283.2)), "cash"))
            .await
            .unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Cancelled);
        assert_eq!(detail.invoice.paid_amount, Money::new(dec!(283.2)));
        assert!(detail.invoice.due_amount.is_zero());
        assert!(detail.invoice.paid_at.is_none());
        assert_eq!(db.invoices().list_payments(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_after_paid_is_appended() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;
        db.invoices().update_status(&id, InvoiceStatus::Sent).await.unwrap();

        let paid = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(283.2)), "transfer"))
            .await
            .unwrap();
        assert_eq!(paid.invoice.status, InvoiceStatus::Paid);
        let paid_at = paid.invoice.paid_at;

        let extra = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(10)), "cash"))
            .await
            .unwrap();
        assert_eq!(extra.invoice.status, InvoiceStatus::Paid);
        assert_eq!(extra.invoice.paid_amount, Money::new(dec!(293.2)));
        assert!(extra.invoice.due_amount.is_zero());
        assert_eq!(extra.invoice.paid_at, paid_at);
        assert_eq!(db.invoices().list_payments(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_overflow_writes_nothing() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;
        db.invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(1)), "cash"))
            .await
            .unwrap();

        let err = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::new(Decimal::MAX), "cash"))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            ServiceError::Core(CoreError::AmountOutOfRange { field }) if field == "paidAmount"
        ));
        assert_eq!(kind(err), ErrorKind::InvalidInput);

        let stored = db.invoices().get(&id).await.unwrap().invoice;
        assert_eq!(stored.paid_amount, Money::new(dec!(1)));
        assert_eq!(db.invoices().list_payments(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_overflowing_item_writes_nothing() {
        let (db, client) = setup().await;
        let items = vec![LineItemInput::new("Bulk", dec!(2), Money::new(Decimal::MAX))];

        let err = db
            .invoices()
            .create(new_invoice(&client, items))
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::InvalidInput);
        assert!(db
            .invoices()
            .list(&InvoiceFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_payment_amount_must_be_positive() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        let err = db
            .invoices()
            .add_payment(&id, NewPayment::new(Money::zero(), "cash"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidPaymentAmount { .. })
        ));

        let err = db
            .invoices()
            .add_payment("missing", NewPayment::new(Money::new(dec!(5)), "cash"))
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_replaces_items() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;
        db.invoices()
            .add_payment(&id, NewPayment::new(Money::new(dec!(100)), "cash"))
            .await
            .unwrap();

        let patch = UpdateInvoice {
            items: Some(vec![LineItemInput::new("Audit", dec!(1), Money::new(dec!(50)))
                .with_tax_rate(TaxRate::zero())]),
            notes: Some("revised".to_string()),
            ..Default::default()
        };
        let detail = db.invoices().update(&id, patch).await.unwrap();
        let invoice = detail.invoice;

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.total_amount, Money::new(dec!(50)));
        // total − paid, not clamped
        assert_eq!(invoice.due_amount, Money::new(dec!(-50)));
        assert_eq!(invoice.notes.as_deref(), Some("revised"));

        let stored = db.invoices().get(&id).await.unwrap().invoice;
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].line.description, "Audit");
    }

    #[tokio::test]
    async fn test_update_with_invalid_status_writes_nothing() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        let patch = UpdateInvoice {
            items: Some(vec![LineItemInput::new("Other", dec!(1), Money::new(dec!(1)))]),
            status: Some(InvoiceStatus::Paid),
            notes: Some("should not stick".to_string()),
            ..Default::default()
        };
        let err = db.invoices().update(&id, patch).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::InvalidTransition);

        let stored = db.invoices().get(&id).await.unwrap().invoice;
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.total_amount, Money::new(dec!(283.2)));
        assert_eq!(stored.notes, None);
    }

    #[tokio::test]
    async fn test_update_with_empty_items_rolls_back() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        let patch = UpdateInvoice {
            items: Some(vec![]),
            status: Some(InvoiceStatus::Sent),
            ..Default::default()
        };
        let err = db.invoices().update(&id, patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::EmptyLineItems)));

        let stored = db.invoices().get(&id).await.unwrap().invoice;
        assert_eq!(stored.status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_from_quote_copies_items() {
        let (db, client) = setup().await;
        let quote = accepted_quote(&db, &client).await;

        let detail = db
            .invoices()
            .create_from_quote(CreateInvoiceFromQuote {
                quote_id: quote.id.clone(),
                created_by: "user-2".to_string(),
                due_date: None,
                project_id: None,
            })
            .await
            .unwrap();
        let invoice = &detail.invoice;

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.quote_id.as_deref(), Some(quote.id.as_str()));
        assert_eq!(invoice.project_id.as_deref(), Some("proj-7"));
        assert_eq!(invoice.total_amount, quote.total_amount);
        assert_eq!(invoice.due_amount, quote.total_amount);
        assert_eq!(detail.quote_number.as_deref(), Some(quote.number.as_str()));
        assert_eq!(invoice.items.len(), quote.items.len());
        for (copied, original) in invoice.items.iter().zip(&quote.items) {
            assert_eq!(copied.line, original.line);
            assert_ne!(copied.id, original.id);
        }
        let days = (invoice.due_date - invoice.created_at).num_days();
        assert_eq!(days, 30);

        let fetched = db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(fetched.quote_number.as_deref(), Some(quote.number.as_str()));
    }

    #[tokio::test]
    async fn test_create_from_quote_only_once() {
        let (db, client) = setup().await;
        let quote = accepted_quote(&db, &client).await;
        let request = CreateInvoiceFromQuote {
            quote_id: quote.id.clone(),
            created_by: "user-1".to_string(),
            due_date: None,
            project_id: None,
        };

        let first = db.invoices().create_from_quote(request.clone()).await.unwrap();

        let err = db
            .invoices()
            .create_from_quote(request.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvoiceAlreadyExists(_))
        ));
        assert_eq!(kind(err), ErrorKind::InvalidInput);

        // Removing the invoice frees the quote
        db.invoices().remove(&first.invoice.id).await.unwrap();
        assert!(db.invoices().create_from_quote(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_from_unaccepted_quote_fails() {
        let (db, client) = setup().await;
        let quote = db
            .quotes()
            .create(CreateQuote {
                client_id: client.id.clone(),
                items: reference_items(),
                valid_until: None,
                tax_rate: None,
                project_id: None,
                created_by: "user-1".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        for quote_id in [quote.id.clone(), "missing".to_string()] {
            let err = db
                .invoices()
                .create_from_quote(CreateInvoiceFromQuote {
                    quote_id,
                    created_by: "user-1".to_string(),
                    due_date: None,
                    project_id: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Core(CoreError::QuoteNotConvertible(_))
            ));
            assert_eq!(kind(err), ErrorKind::InvalidInput);
        }

        // Still convertible once accepted
        db.quotes()
            .update(
                &quote.id,
                UpdateQuote {
                    status: Some(QuoteStatus::Sent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.quotes()
            .update_status(&quote.id, QuoteStatus::Accepted)
            .await
            .unwrap();
        assert!(db
            .invoices()
            .create_from_quote(CreateInvoiceFromQuote {
                quote_id: quote.id,
                created_by: "user-1".to_string(),
                due_date: None,
                project_id: None,
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_remove_is_soft() {
        let (db, client) = setup().await;
        let id = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice
            .id;

        db.invoices().remove(&id).await.unwrap();

        assert_eq!(kind(db.invoices().get(&id).await.unwrap_err()), ErrorKind::NotFound);
        assert_eq!(kind(db.invoices().remove(&id).await.unwrap_err()), ErrorKind::NotFound);
        assert_eq!(
            kind(
                db.invoices()
                    .update_status(&id, InvoiceStatus::Sent)
                    .await
                    .unwrap_err()
            ),
            ErrorKind::NotFound
        );
        assert!(db
            .invoices()
            .list(&InvoiceFilter::default())
            .await
            .unwrap()
            .is_empty());

        let deleted: Option<String> =
            sqlx::query_scalar("SELECT deleted_at FROM invoices WHERE id = ?1")
                .bind(&id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert!(deleted.is_some());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, client) = setup().await;
        let other = db
            .clients()
            .create(NewClient {
                name: "Globex".to_string(),
                email: None,
            })
            .await
            .unwrap();

        let a = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice;
        db.invoices()
            .create(new_invoice(&other, reference_items()))
            .await
            .unwrap();
        db.invoices().update_status(&a.id, InvoiceStatus::Sent).await.unwrap();

        let all = db.invoices().list(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert!(all[0].number > all[1].number);

        let sent = db
            .invoices()
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Sent),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, a.id);

        let for_other = db
            .invoices()
            .list(&InvoiceFilter {
                client_id: Some(other.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_other.len(), 1);
        assert_eq!(for_other[0].client_id, other.id);

        let limited = db
            .invoices()
            .list(&InvoiceFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_and_mark_overdue() {
        let (db, client) = setup().await;
        let now = Utc::now();

        // Paid in full
        let paid = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice;
        db.invoices().update_status(&paid.id, InvoiceStatus::Sent).await.unwrap();
        db.invoices()
            .add_payment(&paid.id, NewPayment::new(paid.total_amount, "transfer"))
            .await
            .unwrap();

        // Sent and already past due
        let mut late = new_invoice(&client, reference_items());
        late.due_date = now - Duration::days(3);
        let late = db.invoices().create(late).await.unwrap().invoice;
        db.invoices().update_status(&late.id, InvoiceStatus::Sent).await.unwrap();
        db.invoices()
            .add_payment(&late.id, NewPayment::new(Money::new(dec!(83.2)), "cash"))
            .await
            .unwrap();

        // Draft
        db.invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap();

        // Removed rows never count
        let gone = db
            .invoices()
            .create(new_invoice(&client, reference_items()))
            .await
            .unwrap()
            .invoice;
        db.invoices().remove(&gone.id).await.unwrap();

        let stats = db.invoices().get_stats(now).await.unwrap();
        assert_eq!(stats.total_invoices, 3);
        assert_eq!(stats.paid_invoices, 1);
        assert_eq!(stats.draft_invoices, 1);
        assert_eq!(stats.overdue_invoices, 1);
        assert_eq!(stats.total_revenue, Money::new(dec!(283.2)));
        assert_eq!(stats.outstanding_amount, Money::new(dec!(200)));

        let moved = db.invoices().mark_overdue(now).await.unwrap();
        assert_eq!(moved, 1);
        let late = db.invoices().get(&late.id).await.unwrap().invoice;
        assert_eq!(late.status, InvoiceStatus::Overdue);
        assert_eq!(db.invoices().mark_overdue(now).await.unwrap(), 0);

        // Overdue invoices still take payments and complete
        let done = db
            .invoices()
            .add_payment(&late.id, NewPayment::new(Money::new(dec!(200)), "cash"))
            .await
            .unwrap();
        assert_eq!(done.invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_and_payments() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("tally.db"))
            .max_connections(8)
            .busy_timeout(std::time::Duration::from_secs(30));
        let db = Database::new(config).await.unwrap();
        let client = db
            .clients()
            .create(NewClient {
                name: "Acme Corp".to_string(),
                email: None,
            })
            .await
            .unwrap();

        let mut creates = Vec::new();
        for n in 0..30 {
            let service = db.invoices();
            let input = new_invoice(
                &client,
                vec![LineItemInput::new(format!("Job {n}"), dec!(1), Money::new(dec!(100)))
                    .with_tax_type("EXEMPT")],
            );
            creates.push(tokio::spawn(async move { service.create(input).await }));
        }

        let mut numbers = HashSet::new();
        let mut ids = Vec::new();
        for handle in creates {
            let detail = handle.await.unwrap().unwrap();
            numbers.insert(detail.invoice.number);
            ids.push(detail.invoice.id);
        }
        assert_eq!(numbers.len(), 30);

        let target = ids[0].clone();
        db.invoices()
            .update_status(&target, InvoiceStatus::Sent)
            .await
            .unwrap();

        let mut payments = Vec::new();
        for _ in 0..20 {
            let service = db.invoices();
            let id = target.clone();
            payments.push(tokio::spawn(async move {
                service
                    .add_payment(&id, NewPayment::new(Money::new(dec!(5)), "card"))
                    .await
            }));
        }

        let mut completions = 0;
        for handle in payments {
            let detail = handle.await.unwrap().unwrap();
            if detail.invoice.status == InvoiceStatus::Paid {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);

        let stored = db.invoices().get(&target).await.unwrap().invoice;
        assert_eq!(stored.paid_amount, Money::new(dec!(100)));
        assert!(stored.due_amount.is_zero());
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert!(stored.paid_at.is_some());
        assert_eq!(db.invoices().list_payments(&target).await.unwrap().len(), 20);

        db.close().await;
    }
}
