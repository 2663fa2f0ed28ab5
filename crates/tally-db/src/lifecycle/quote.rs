//! # Quote Lifecycle
//!
//! Same transaction discipline as invoices, without payments. Quote items
//! price only an explicit `taxRate` or the document default; tax-type
//! labels are stored but never looked up.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::calculator::calculate_quote_totals;
use tally_core::{
    CoreError, CreateQuote, DocumentKind, DocumentStatus, Quote, QuoteFilter, QuoteStats,
    QuoteStatus, Transition, UpdateQuote,
};

use super::error::ServiceResult;
use crate::config::DocumentDefaults;
use crate::repository::client::ClientRepository;
use crate::repository::counter;
use crate::repository::line::to_document_lines;
use crate::repository::quote::QuoteRepository;

/// Quote lifecycle operations.
#[derive(Debug, Clone)]
pub struct QuoteService {
    pool: SqlitePool,
    defaults: DocumentDefaults,
}

impl QuoteService {
    pub fn new(pool: SqlitePool, defaults: DocumentDefaults) -> Self {
        QuoteService { pool, defaults }
    }

    fn repository(&self) -> QuoteRepository {
        QuoteRepository::new(self.pool.clone())
    }

    /// Creates a DRAFT quote with a fresh number.
    ///
    /// `validUntil` defaults to creation plus the configured validity window.
    pub async fn create(&self, input: CreateQuote) -> ServiceResult<Quote> {
        let tax_rate = input.tax_rate.unwrap_or(self.defaults.tax_rate);
        let calc = calculate_quote_totals(&input.items, tax_rate)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let number = counter::next_number(&mut tx, DocumentKind::Quote, now).await?;

        if ClientRepository::find_live(&mut tx, &input.client_id)
            .await?
            .is_none()
        {
            return Err(CoreError::ClientNotFound(input.client_id).into());
        }

        let valid_until = match input.valid_until {
            Some(valid_until) => valid_until,
            None => self.defaults.valid_until_from(now)?,
        };

        let id = Uuid::new_v4().to_string();
        let quote = Quote {
            items: to_document_lines(&id, calc.items),
            id,
            number,
            status: QuoteStatus::Draft,
            client_id: input.client_id,
            project_id: input.project_id,
            created_by: input.created_by,
            tax_rate,
            subtotal: calc.totals.subtotal,
            discount_amount: calc.totals.discount_amount,
            tax_amount: calc.totals.tax_amount,
            total_amount: calc.totals.total_amount,
            valid_until,
            accepted_at: None,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        QuoteRepository::insert(&mut tx, &quote).await?;
        tx.commit().await?;

        info!(
            quote_id = %quote.id,
            number = %quote.number,
            total = %quote.total_amount,
            "Quote created"
        );
        Ok(quote)
    }

    /// Gets a live quote.
    pub async fn get(&self, id: &str) -> ServiceResult<Quote> {
        let quote = self
            .repository()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::QuoteNotFound(id.to_string()))?;
        Ok(quote)
    }

    /// Lists live quotes, newest first.
    pub async fn list(&self, filter: &QuoteFilter) -> ServiceResult<Vec<Quote>> {
        Ok(self.repository().list(filter).await?)
    }

    /// Applies a partial update. Status is validated first; new items
    /// replace the old ones wholesale.
    pub async fn update(&self, id: &str, patch: UpdateQuote) -> ServiceResult<Quote> {
        let mut tx = self.pool.begin().await?;
        let mut quote = lock_quote(&mut tx, id).await?;

        let transition = match patch.status {
            Some(to) => checked_transition(&quote, to)?,
            None => Transition::Unchanged,
        };

        let now = Utc::now();

        if let Some(rate) = patch.tax_rate {
            quote.tax_rate = rate;
        }

        if let Some(items) = &patch.items {
            let calc = calculate_quote_totals(items, quote.tax_rate)?;
            let lines = to_document_lines(&quote.id, calc.items);
            QuoteRepository::replace_items(&mut tx, &quote.id, &lines).await?;

            quote.items = lines;
            quote.subtotal = calc.totals.subtotal;
            quote.discount_amount = calc.totals.discount_amount;
            quote.tax_amount = calc.totals.tax_amount;
            quote.total_amount = calc.totals.total_amount;

            debug!(quote_id = %quote.id, items = quote.items.len(), "Items replaced");
        }

        if let Some(valid_until) = patch.valid_until {
            quote.valid_until = valid_until;
        }
        if let Some(project_id) = patch.project_id {
            quote.project_id = Some(project_id);
        }
        if let Some(notes) = patch.notes {
            quote.notes = Some(notes);
        }

        apply_transition(&mut quote, transition, now);
        quote.updated_at = now;

        QuoteRepository::update_header(&mut tx, &quote).await?;
        tx.commit().await?;

        info!(quote_id = %id, status = %quote.status, "Quote updated");
        Ok(quote)
    }

    /// Moves a quote to `status`. Same-status requests succeed unchanged.
    pub async fn update_status(&self, id: &str, status: QuoteStatus) -> ServiceResult<Quote> {
        let mut tx = self.pool.begin().await?;
        let mut quote = lock_quote(&mut tx, id).await?;

        let transition = checked_transition(&quote, status)?;
        if !transition.is_change() {
            tx.commit().await?;
            return Ok(quote);
        }

        let now = Utc::now();
        apply_transition(&mut quote, transition, now);
        quote.updated_at = now;

        QuoteRepository::update_header(&mut tx, &quote).await?;
        tx.commit().await?;

        if let Transition::Changed { from, to } = transition {
            info!(quote_id = %id, from = %from, to = %to, "Quote status changed");
        }
        Ok(quote)
    }

    /// Soft-deletes a quote.
    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        if !QuoteRepository::soft_delete(&mut tx, id, Utc::now()).await? {
            return Err(CoreError::QuoteNotFound(id.to_string()).into());
        }
        tx.commit().await?;

        info!(quote_id = %id, "Quote removed");
        Ok(())
    }

    /// Reserves the next quote number for the current month.
    pub async fn generate_number(&self) -> ServiceResult<String> {
        let mut tx = self.pool.begin().await?;
        let number = counter::next_number(&mut tx, DocumentKind::Quote, Utc::now()).await?;
        tx.commit().await?;
        Ok(number)
    }

    pub async fn get_stats(&self) -> ServiceResult<QuoteStats> {
        Ok(self.repository().stats().await?)
    }

    /// Moves every SENT quote whose validity ended before `now` to EXPIRED.
    pub async fn mark_expired(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        QuoteStatus::Sent.transition_to(QuoteStatus::Expired)?;

        let mut tx = self.pool.begin().await?;
        let moved = QuoteRepository::set_status_where_valid_before(
            &mut tx,
            QuoteStatus::Sent,
            QuoteStatus::Expired,
            now,
        )
        .await?;
        tx.commit().await?;

        if moved > 0 {
            info!(count = moved, "Quotes expired");
        }
        Ok(moved)
    }
}

async fn lock_quote(conn: &mut SqliteConnection, id: &str) -> ServiceResult<Quote> {
    if !QuoteRepository::touch(conn, id).await? {
        return Err(CoreError::QuoteNotFound(id.to_string()).into());
    }
    let quote = QuoteRepository::find_live(conn, id)
        .await?
        .ok_or_else(|| CoreError::QuoteNotFound(id.to_string()))?;
    Ok(quote)
}

fn checked_transition(quote: &Quote, to: QuoteStatus) -> ServiceResult<Transition<QuoteStatus>> {
    quote.status.transition_to(to).map_err(|err| {
        warn!(
            quote_id = %quote.id,
            from = %quote.status,
            to = %to,
            "Quote transition rejected"
        );
        err.into()
    })
}

fn apply_transition(quote: &mut Quote, transition: Transition<QuoteStatus>, now: DateTime<Utc>) {
    if let Transition::Changed { to, .. } = transition {
        quote.status = to;
        if to.stamps_accepted_at() {
            quote.accepted_at = Some(now);
        }
    }
}
