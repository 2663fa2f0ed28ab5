//! # Client Repository
//!
//! The minimal client record the document engine needs: documents must
//! reference a live client.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use tally_core::validation::validate_client_name;
use tally_core::{Client, NewClient};

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: String,
    name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Creates a client.
    pub async fn create(&self, new: NewClient) -> DbResult<Client> {
        validate_client_name(&new.name)?;

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            email: new.email,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %client.id, name = %client.name, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clients (id, name, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(client)
    }

    /// Gets a live client by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Client>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_live(&mut conn, id).await
    }

    /// Soft-deletes a client. Documents keep their reference.
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE clients SET deleted_at = ?2, updated_at = ?2
            WHERE id = (SELECT id FROM live_clients WHERE id = ?1)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        Ok(())
    }

    /// Finds a live client on an existing connection or transaction.
    pub async fn find_live(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Client>> {
        let row: Option<ClientRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM live_clients
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Client::from))
    }
}
