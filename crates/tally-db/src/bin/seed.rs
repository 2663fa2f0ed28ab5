//! # Seed Data Generator
//!
//! Populates a development database with clients, quotes, invoices and
//! payments spread over every status.
//!
//! ## Usage
//! ```bash
//! # 30 invoices (default) into TALLY_DB_PATH or ./tally.db
//! cargo run -p tally-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p tally-db --bin seed -- --count 200 --db ./data/tally_dev.db
//! ```
//!
//! ## Generated Data
//! - One client per entry in `CLIENTS`
//! - Quotes in DRAFT, SENT and ACCEPTED; every third accepted quote is
//!   converted into an invoice
//! - Invoices cycling through DRAFT, SENT (partly paid), PAID (via payment),
//!   OVERDUE and CANCELLED

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_core::{
    CreateInvoice, CreateInvoiceFromQuote, CreateQuote, InvoiceStatus, LineItemInput, Money,
    NewClient, NewPayment, QuoteStatus,
};
use tally_db::{Database, TallyConfig};

/// Client names for realistic test data
const CLIENTS: &[&str] = &[
    "Acme Corp",
    "Globex",
    "Initech",
    "Umbrella Logistics",
    "Stark Consulting",
    "Wayne Holdings",
];

/// Billable services: (description, unit price in cents, tax label)
const SERVICES: &[(&str, i64, Option<&str>)] = &[
    ("Discovery workshop", 120_000, None),
    ("UX design (per day)", 65_000, Some("IVA_18")),
    ("Backend development (per day)", 72_000, Some("IVA_18")),
    ("Training session", 30_000, Some("IVA_10")),
    ("Annual support plan", 240_000, Some("EXEMPT")),
    ("Hosting (monthly)", 4_999, None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config = TallyConfig::from_env()?;
    let mut count: usize = 30;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.db_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of invoices to generate (default: 30)");
                println!("  -d, --db <PATH>    Database file path (default: $TALLY_DB_PATH or ./tally.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.db_path.display());
    println!("Invoices: {}", count);
    println!();

    let db = Database::new(config.db_config())
        .await?
        .with_defaults(config.defaults);

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.invoices().get_stats(Utc::now()).await?;
    if existing.total_invoices > 0 {
        println!("⚠ Database already has {} invoices", existing.total_invoices);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Clients
    let mut clients = Vec::with_capacity(CLIENTS.len());
    for name in CLIENTS {
        let email = format!("billing@{}.test", name.to_lowercase().replace(' ', "-"));
        let client = db
            .clients()
            .create(NewClient {
                name: name.to_string(),
                email: Some(email),
            })
            .await?;
        clients.push(client);
    }
    println!("✓ Created {} clients", clients.len());

    // Quotes
    let mut converted = 0;
    for seed in 0..(count / 2).max(1) {
        let client = &clients[seed % clients.len()];
        let quote = db
            .quotes()
            .create(CreateQuote {
                client_id: client.id.clone(),
                items: generate_items(seed),
                valid_until: None,
                tax_rate: None,
                project_id: None,
                created_by: "seed".to_string(),
                notes: None,
            })
            .await?;

        match seed % 3 {
            0 => {}
            1 => {
                db.quotes().update_status(&quote.id, QuoteStatus::Sent).await?;
            }
            _ => {
                db.quotes().update_status(&quote.id, QuoteStatus::Sent).await?;
                db.quotes()
                    .update_status(&quote.id, QuoteStatus::Accepted)
                    .await?;
                db.invoices()
                    .create_from_quote(CreateInvoiceFromQuote {
                        quote_id: quote.id.clone(),
                        created_by: "seed".to_string(),
                        due_date: None,
                        project_id: None,
                    })
                    .await?;
                converted += 1;
            }
        }
    }
    println!("✓ Created {} quotes ({} converted)", (count / 2).max(1), converted);

    // Invoices
    let now = Utc::now();
    for seed in 0..count {
        let client = &clients[seed % clients.len()];
        let due_in = if seed % 5 == 3 { -10 } else { 30 };

        let detail = db
            .invoices()
            .create(CreateInvoice {
                client_id: client.id.clone(),
                items: generate_items(seed + 7),
                due_date: now + Duration::days(due_in),
                tax_rate: None,
                quote_id: None,
                project_id: None,
                created_by: "seed".to_string(),
                notes: None,
            })
            .await?;
        let invoice = detail.invoice;

        match seed % 5 {
            // DRAFT
            0 => {}
            // SENT, half paid
            1 => {
                db.invoices().update_status(&invoice.id, InvoiceStatus::Sent).await?;
                let half = Money::new(invoice.total_amount.amount() / Decimal::TWO);
                db.invoices()
                    .add_payment(&invoice.id, NewPayment::new(half, "transfer"))
                    .await?;
            }
            // PAID through payment completion
            2 => {
                db.invoices().update_status(&invoice.id, InvoiceStatus::Sent).await?;
                db.invoices()
                    .add_payment(&invoice.id, NewPayment::new(invoice.total_amount, "card"))
                    .await?;
            }
            // SENT and past due, picked up by mark_overdue below
            3 => {
                db.invoices().update_status(&invoice.id, InvoiceStatus::Sent).await?;
            }
            _ => {
                db.invoices()
                    .update_status(&invoice.id, InvoiceStatus::Cancelled)
                    .await?;
            }
        }
    }

    let overdue = db.invoices().mark_overdue(now).await?;
    info!(count = overdue, "Marked overdue");

    let elapsed = start.elapsed();
    println!("✓ Created {} invoices in {:?}", count, elapsed);

    let stats = db.invoices().get_stats(Utc::now()).await?;
    let quote_stats = db.quotes().get_stats().await?;

    println!();
    println!("Invoices:");
    println!("  Total:       {}", stats.total_invoices);
    println!("  Paid:        {}", stats.paid_invoices);
    println!("  Draft:       {}", stats.draft_invoices);
    println!("  Overdue:     {}", stats.overdue_invoices);
    println!("  Revenue:     {}", stats.total_revenue);
    println!("  Outstanding: {}", stats.outstanding_amount);
    println!("Quotes:");
    println!("  Total:       {}", quote_stats.total_quotes);
    println!("  Accepted:    {} ({})", quote_stats.accepted_quotes, quote_stats.accepted_value);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// One to three items picked deterministically from `SERVICES`.
fn generate_items(seed: usize) -> Vec<LineItemInput> {
    let lines = 1 + seed % 3;
    (0..lines)
        .map(|n| {
            let (description, cents, label) = SERVICES[(seed + n * 2) % SERVICES.len()];
            let quantity = Decimal::from(1 + ((seed + n) % 4) as i64);
            let mut item = LineItemInput::new(description, quantity, Money::new(Decimal::new(cents, 2)))
                .with_order(n as i32);
            if let Some(label) = label {
                item = item.with_tax_type(label);
            }
            if seed % 4 == 0 && n == 0 {
                item = item.with_discount(Money::new(Decimal::new(5_000, 2)));
            }
            item
        })
        .collect()
}
