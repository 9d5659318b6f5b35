use async_trait::async_trait;
use crate::{ConflictEvent, JournalError, LlmError};

/// Language-model collaborator used by the synthesis fallback.
///
/// Implementations receive a fully rendered prompt and return the raw text of the
/// model's answer; parsing and validation stay inside the engine.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn backend_name(&self) -> &'static str;
}

/// Destination for conflict events. Called fire-and-forget; a failing sink never
/// changes the decision that produced the event.
#[async_trait]
pub trait ConflictSink: Send + Sync {
    async fn record(&self, event: &ConflictEvent) -> Result<(), JournalError>;

    fn name(&self) -> &str;
}
