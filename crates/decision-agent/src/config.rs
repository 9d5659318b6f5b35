use anyhow::{Context, Result};
use conflict_journal::JournalConfig;
use decision_engine::EngineConfig;
use llm_client::LlmConfig;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub engine: EngineConfig,
    /// `None` disables the LLM fallback
    pub llm: Option<LlmConfig>,
    pub journal: JournalConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            engine: EngineConfig::from_env().context("invalid engine configuration")?,
            llm: LlmConfig::from_env(),
            journal: JournalConfig::from_env(),
        };

        Ok(config)
    }
}
