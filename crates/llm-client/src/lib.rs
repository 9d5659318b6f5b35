pub mod chat;
pub mod error;

pub use chat::ChatCompletionsClient;
pub use error::{LlmClientError, LlmClientResult};

use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `LLM_API_URL`, `LLM_API_KEY`, `LLM_MODEL` and `LLM_TIMEOUT_SECS`.
    /// Returns `None` when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_url = lookup("LLM_API_URL").filter(|v| !v.trim().is_empty())?;
        let mut config = Self::new(api_url.trim());

        config.api_key = lookup("LLM_API_KEY").filter(|v| !v.trim().is_empty());
        if let Some(model) = lookup("LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            config.model = model;
        }
        match lookup("LLM_TIMEOUT_SECS").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.timeout = Duration::from_secs(secs),
            Some(_) => tracing::warn!(
                "Invalid LLM_TIMEOUT_SECS, using default of {}s",
                DEFAULT_TIMEOUT_SECS
            ),
            None => {}
        }

        Some(config)
    }
}
