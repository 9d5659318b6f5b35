use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signal_core::{ConflictEvent, ConflictSink, DecisionAction, JournalError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

/// Persists conflict events to a `signal_conflicts` table.
#[derive(Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> JournalError {
    JournalError::Database(e.to_string())
}

impl SqliteSink {
    /// Open (creating if missing) the database and ensure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, JournalError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        // Each in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let sink = Self { pool };
        sink.init_table().await?;
        Ok(sink)
    }

    pub async fn init_table(&self) -> Result<(), JournalError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS signal_conflicts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                final_signal TEXT NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL,
                agent_scores TEXT NOT NULL,
                metadata TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_signal_conflicts_symbol ON signal_conflicts (symbol, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Most recent conflicts for a symbol, newest first
    pub async fn recent(&self, symbol: &str, limit: i64) -> Result<Vec<ConflictEvent>, JournalError> {
        let rows = sqlx::query(
            "SELECT symbol, interval, final_signal, confidence, reasoning, agent_scores, metadata, timestamp
             FROM signal_conflicts WHERE symbol = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let final_signal: String = row.get("final_signal");
                let agent_scores: String = row.get("agent_scores");
                let metadata: String = row.get("metadata");
                let timestamp: String = row.get("timestamp");

                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| JournalError::Database(format!("bad timestamp {}: {}", timestamp, e)))?
                    .with_timezone(&Utc);

                Ok(ConflictEvent {
                    symbol: row.get("symbol"),
                    interval: row.get("interval"),
                    final_signal: serde_json::from_value::<DecisionAction>(serde_json::Value::String(final_signal))?,
                    confidence: row.get("confidence"),
                    reasoning: row.get("reasoning"),
                    agent_scores: serde_json::from_str(&agent_scores)?,
                    metadata: serde_json::from_str(&metadata)?,
                    timestamp,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ConflictSink for SqliteSink {
    async fn record(&self, event: &ConflictEvent) -> Result<(), JournalError> {
        let agent_scores = serde_json::to_string(&event.agent_scores)?;
        let metadata = serde_json::to_string(&event.metadata)?;

        sqlx::query(
            "INSERT INTO signal_conflicts (symbol, interval, final_signal, confidence, reasoning, agent_scores, metadata, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.symbol)
        .bind(&event.interval)
        .bind(event.final_signal.as_str())
        .bind(event.confidence)
        .bind(&event.reasoning)
        .bind(&agent_scores)
        .bind(&metadata)
        .bind(event.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
