use eyre::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::reporter::OutcomeEvent;

/// Durable append-only record of processing outcomes.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    pub async fn connect(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);
        // One connection: in-memory databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outcome_events (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                kind TEXT NOT NULL,
                account TEXT NOT NULL,
                health_score INTEGER NOT NULL,
                collateral_value TEXT NOT NULL,
                yield_ref TEXT,
                required_yield TEXT,
                tx_hash TEXT,
                detail TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub async fn record(&self, event: &OutcomeEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outcome_events
                (id, kind, account, health_score, collateral_value,
                 yield_ref, required_yield, tx_hash, detail)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(event.kind.as_str())
        .bind(format!("{}", event.account))
        .bind(event.health_score as i64)
        .bind(event.collateral_value.to_string())
        .bind(event.yield_ref.map(|v| v.to_string()))
        .bind(event.required_yield.map(|v| v.to_string()))
        .bind(event.tx_hash.map(|h| format!("{h}")))
        .bind(&event.detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_by_kind(&self, kind: &str) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM outcome_events WHERE kind = ?")
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
