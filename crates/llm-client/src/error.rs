use signal_core::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type LlmClientResult<T> = Result<T, LlmClientError>;

impl From<LlmClientError> for LlmError {
    fn from(err: LlmClientError) -> Self {
        match err {
            LlmClientError::RequestFailed(e) if e.is_timeout() => LlmError::Timeout,
            LlmClientError::RequestFailed(e) => LlmError::RequestFailed(e.to_string()),
            LlmClientError::ServiceUnavailable(msg) => LlmError::ServiceUnavailable(msg),
            LlmClientError::InvalidResponse(msg) => LlmError::InvalidResponse(msg),
            LlmClientError::Serialization(e) => LlmError::InvalidResponse(e.to_string()),
            LlmClientError::Config(_) => LlmError::NotConfigured,
        }
    }
}
