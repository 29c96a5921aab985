//! Durable subscriber storage: the query surface the core issues against
//! its Postgres-backed tables, built on runtime `sqlx::query`/`query_as`
//! calls rather than compile-time-checked macros, since no live database is
//! reachable at build time — the same tradeoff the teacher's
//! `PostgresManager` makes.

use crate::core::error::TrackerResult;
use crate::core::types::Timestamp;
use crate::models::Subscriber;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn load_all(&self) -> TrackerResult<Vec<Subscriber>>;
    async fn load(&self, chat_id: i64) -> TrackerResult<Option<Subscriber>>;
    async fn save(&self, subscriber: &Subscriber) -> TrackerResult<()>;
    async fn record_seen_tx(&self, sig: &str, added_at: Timestamp) -> TrackerResult<()>;
    async fn seen_tx_exists(&self, sig: &str) -> TrackerResult<bool>;
    async fn prune_seen_txs_older_than(&self, cutoff: Timestamp) -> TrackerResult<u64>;
}

#[derive(Clone)]
pub struct PostgresSubscriberStore {
    pool: PgPool,
}

impl PostgresSubscriberStore {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Applies the schema the core relies on. Migration ownership lives
    /// outside the core; this only guarantees the tables exist for local
    /// development and tests against a disposable database.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                chat_id BIGINT PRIMARY KEY,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_txs (
                sig TEXT PRIMARY KEY,
                added_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SubscriberStore for PostgresSubscriberStore {
    async fn load_all(&self) -> TrackerResult<Vec<Subscriber>> {
        let rows = sqlx::query("SELECT data FROM subscribers").fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let data: serde_json::Value = row.try_get("data")?;
            if let Ok(sub) = serde_json::from_value(data) {
                out.push(sub);
            }
        }
        Ok(out)
    }

    async fn load(&self, chat_id: i64) -> TrackerResult<Option<Subscriber>> {
        let row = sqlx::query("SELECT data FROM subscribers WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data")?;
                Ok(serde_json::from_value(data).ok())
            }
            None => Ok(None),
        }
    }

    async fn save(&self, subscriber: &Subscriber) -> TrackerResult<()> {
        let data = serde_json::to_value(subscriber)?;
        sqlx::query(
            r#"
            INSERT INTO subscribers (chat_id, data, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (chat_id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(subscriber.chat_id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_seen_tx(&self, sig: &str, added_at: Timestamp) -> TrackerResult<()> {
        sqlx::query("INSERT INTO seen_txs (sig, added_at) VALUES ($1, $2) ON CONFLICT (sig) DO NOTHING")
            .bind(sig)
            .bind(added_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn seen_tx_exists(&self, sig: &str) -> TrackerResult<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_txs WHERE sig = $1")
            .bind(sig)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn prune_seen_txs_older_than(&self, cutoff: Timestamp) -> TrackerResult<u64> {
        let result = sqlx::query("DELETE FROM seen_txs WHERE added_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
