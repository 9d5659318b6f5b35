/// Canonical name of the liquidity analyst (eligible for the single-source fallback)
pub const LIQUIDITY_AGENT: &str = "LiquidityAnalystAgent";

/// Fixed mapping from analysis key to canonical agent name
pub const AGENT_TABLE: &[(&str, &str)] = &[
    ("technical_analysis", "TechnicalAnalystAgent"),
    ("sentiment_analysis", "SentimentAnalystAgent"),
    ("liquidity_analysis", LIQUIDITY_AGENT),
    ("funding_rate_analysis", "FundingRateAnalystAgent"),
    ("open_interest_analysis", "OpenInterestAnalystAgent"),
];

/// Look up the canonical agent name for an analysis key.
pub fn canonical_agent_name(analysis_key: &str) -> Option<&'static str> {
    AGENT_TABLE
        .iter()
        .find(|(key, _)| *key == analysis_key)
        .map(|(_, name)| *name)
}

/// Resolve a key to an agent name, passing unknown keys through unchanged.
/// The boolean is `false` when the key was not in the table.
pub fn resolve_agent_name(analysis_key: &str) -> (String, bool) {
    match canonical_agent_name(analysis_key) {
        Some(name) => (name.to_string(), true),
        None => (analysis_key.to_string(), false),
    }
}
