//! Destinations for conflict events raised by the decision engine.

mod sqlite;
mod webhook;

pub use sqlite::SqliteSink;
pub use webhook::WebhookSink;

use async_trait::async_trait;
use signal_core::{ConflictEvent, ConflictSink, JournalError};
use std::sync::Arc;

/// Configuration for the conflict journal.
#[derive(Debug, Clone, Default)]
pub struct JournalConfig {
    pub database_url: Option<String>,
    pub webhook_url: Option<String>,
}

impl JournalConfig {
    /// Load from `CONFLICT_DB_URL` and `CONFLICT_WEBHOOK_URL`.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("CONFLICT_DB_URL").ok().filter(|s| !s.is_empty()),
            webhook_url: std::env::var("CONFLICT_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Logs every conflict at warn level.
pub struct TracingSink;

#[async_trait]
impl ConflictSink for TracingSink {
    async fn record(&self, event: &ConflictEvent) -> Result<(), JournalError> {
        let metadata = serde_json::to_string(&event.metadata)?;
        tracing::warn!(
            symbol = %event.symbol,
            interval = %event.interval,
            final_signal = %event.final_signal,
            confidence = event.confidence,
            agents = event.agent_scores.len(),
            "Signal conflict: {} ({})",
            event.reasoning,
            metadata
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Fans each conflict event out to every configured sink.
#[derive(Clone)]
pub struct ConflictJournal {
    sinks: Arc<Vec<Box<dyn ConflictSink>>>,
}

impl ConflictJournal {
    pub fn new(sinks: Vec<Box<dyn ConflictSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    /// Build the journal from config. The tracing sink is always present; a sink that
    /// fails to initialize is skipped with a warning.
    pub async fn from_config(config: &JournalConfig) -> Self {
        let mut sinks: Vec<Box<dyn ConflictSink>> = vec![Box::new(TracingSink)];

        if let Some(ref url) = config.database_url {
            match SqliteSink::connect(url).await {
                Ok(sink) => {
                    tracing::info!("Conflict journal persisting to {}", url);
                    sinks.push(Box::new(sink));
                }
                Err(e) => tracing::warn!("Failed to open conflict database {}: {}", url, e),
            }
        }

        if let Some(ref url) = config.webhook_url {
            sinks.push(Box::new(WebhookSink::new(url.clone())));
            tracing::info!("Conflict webhook notifications enabled");
        }

        Self::new(sinks)
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl ConflictSink for ConflictJournal {
    async fn record(&self, event: &ConflictEvent) -> Result<(), JournalError> {
        for sink in self.sinks.iter() {
            match sink.record(event).await {
                Ok(()) => tracing::debug!("Recorded conflict for {} via {}", event.symbol, sink.name()),
                Err(e) => {
                    tracing::warn!("Failed to record conflict via {}: {}", sink.name(), e)
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "journal"
    }
}
