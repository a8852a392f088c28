//! PostgreSQL-backed content store.
//!
//! One connection is opened per run and reused for every query. The
//! connection driver runs on its own task, as tokio-postgres requires.

use super::FlyerStore;
use crate::error::Result;
use crate::models::FlyerRecord;
use crate::retry::{Backoff, with_backoff};
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info, instrument};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS flyers (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Open a single connection and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Postgres connection error");
            }
        });
        let store = Self { client };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// [`PgStore::connect`] retried under `policy`.
    #[instrument(level = "info", skip_all, fields(max_attempts = policy.max_attempts))]
    pub async fn connect_with_backoff(database_url: &str, policy: &Backoff) -> Result<Self> {
        let store = with_backoff(policy, "database connection", || Self::connect(database_url)).await?;
        info!("Connected to database");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }
}

fn record_from_row(row: &Row) -> FlyerRecord {
    FlyerRecord {
        id: row.get("id"),
        source: row.get("source"),
        created_at: row.get("created_at"),
    }
}

impl FlyerStore for PgStore {
    async fn contains(&self, id: &str) -> Result<bool> {
        let row = self
            .client
            .query_opt("SELECT 1 FROM flyers WHERE id = $1", &[&id])
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, id: &str, source: &str) -> Result<bool> {
        let inserted = self
            .client
            .execute(
                "INSERT INTO flyers (id, source) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
                &[&id, &source],
            )
            .await?;
        Ok(inserted == 1)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.client
            .execute("DELETE FROM flyers WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = self
            .client
            .execute("DELETE FROM flyers WHERE created_at < $1", &[&cutoff])
            .await?;
        Ok(deleted)
    }

    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<FlyerRecord>> {
        let rows = self
            .client
            .query(
                "SELECT id, source, created_at FROM flyers WHERE created_at >= $1 ORDER BY created_at",
                &[&since],
            )
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }
}
