use thiserror::Error;

/// Failures inside the decision pipeline. None of these escape `DecisionEngine::decide`;
/// they are converted into a conservative HOLD decision at the engine boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("LLM synthesis error: {0}")]
    LlmSynthesis(String),
}

pub type DecisionResult<T> = Result<T, DecisionError>;

/// Errors returned by an `LlmProvider`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("No LLM provider configured")]
    NotConfigured,
}

/// Errors returned by a `ConflictSink`.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
