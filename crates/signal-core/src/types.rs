use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Action reported by a single analyst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    Neutral,
    Unknown,
}

impl SignalAction {
    /// Parse an action label, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(SignalAction::Buy),
            "SELL" => Some(SignalAction::Sell),
            "HOLD" => Some(SignalAction::Hold),
            "NEUTRAL" => Some(SignalAction::Neutral),
            "UNKNOWN" => Some(SignalAction::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
            SignalAction::Neutral => "NEUTRAL",
            SignalAction::Unknown => "UNKNOWN",
        }
    }

    /// Voting bucket this action accumulates into. UNKNOWN votes with HOLD.
    pub fn bucket(&self) -> Bucket {
        match self {
            SignalAction::Buy => Bucket::Buy,
            SignalAction::Sell => Bucket::Sell,
            SignalAction::Hold | SignalAction::Unknown => Bucket::Hold,
            SignalAction::Neutral => Bucket::Neutral,
        }
    }

    pub fn is_directional(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::Sell)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote accumulator class. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bucket {
    Buy,
    Sell,
    Hold,
    Neutral,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Buy, Bucket::Sell, Bucket::Hold, Bucket::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Buy => "BUY",
            Bucket::Sell => "SELL",
            Bucket::Hold => "HOLD",
            Bucket::Neutral => "NEUTRAL",
        }
    }

    pub fn is_directional(&self) -> bool {
        matches!(self, Bucket::Buy | Bucket::Sell)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible action of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
    Conflicted,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Buy => "BUY",
            DecisionAction::Sell => "SELL",
            DecisionAction::Hold => "HOLD",
            DecisionAction::Conflicted => "CONFLICTED",
        }
    }

    /// Whether an analyst's vote agrees with this action. NEUTRAL and UNKNOWN agree with HOLD.
    pub fn matches(&self, action: SignalAction) -> bool {
        match self {
            DecisionAction::Buy => action == SignalAction::Buy,
            DecisionAction::Sell => action == SignalAction::Sell,
            DecisionAction::Hold => action.bucket() == Bucket::Hold || action == SignalAction::Neutral,
            DecisionAction::Conflicted => false,
        }
    }
}

impl From<Bucket> for DecisionAction {
    fn from(bucket: Bucket) -> Self {
        match bucket {
            Bucket::Buy => DecisionAction::Buy,
            Bucket::Sell => DecisionAction::Sell,
            Bucket::Hold | Bucket::Neutral => DecisionAction::Hold,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Success,
    Error,
}

/// Error category reported by an analyst alongside `status: error`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorType {
    InsufficientData,
    DataFetcherMissing,
    ApiError,
    ApiKeyError,
    Other(String),
}

impl ErrorType {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::InsufficientData => "INSUFFICIENT_DATA",
            ErrorType::DataFetcherMissing => "DATA_FETCHER_MISSING",
            ErrorType::ApiError => "API_ERROR",
            ErrorType::ApiKeyError => "API_KEY_ERROR",
            ErrorType::Other(s) => s,
        }
    }
}

impl From<String> for ErrorType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INSUFFICIENT_DATA" => ErrorType::InsufficientData,
            "DATA_FETCHER_MISSING" => ErrorType::DataFetcherMissing,
            "API_ERROR" => ErrorType::ApiError,
            "API_KEY_ERROR" => ErrorType::ApiKeyError,
            _ => ErrorType::Other(raw),
        }
    }
}

impl From<&str> for ErrorType {
    fn from(raw: &str) -> Self {
        ErrorType::from(raw.to_string())
    }
}

impl From<ErrorType> for String {
    fn from(error_type: ErrorType) -> Self {
        error_type.as_str().to_string()
    }
}

/// One analyst's opinion after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// Key the payload arrived under (e.g. "technical_analysis")
    pub agent_key: String,
    /// Canonical agent name (e.g. "TechnicalAnalystAgent")
    pub agent_name: String,
    pub action: SignalAction,
    /// Self-reported certainty, 0 to 100
    pub confidence: f64,
    pub status: AnalysisStatus,
    pub error_type: Option<ErrorType>,
    pub reasoning: String,
}

impl AnalysisInput {
    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }

    pub fn has_insufficient_data(&self) -> bool {
        self.status == AnalysisStatus::Error && self.error_type == Some(ErrorType::InsufficientData)
    }
}

/// How a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    WeightedDirectional,
    LiquidityBased,
    LlmBased,
    Fallback,
    ErrorFallback,
}

/// Why a decision degraded to a safe HOLD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    #[serde(rename = "Missing Data")]
    MissingData,
    #[serde(rename = "All Failed Sanity Check")]
    AllFailedSanityCheck,
    #[serde(rename = "Validation Error")]
    ValidationError,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
    #[serde(rename = "Aggregation Error")]
    AggregationError,
    #[serde(rename = "LLM Error")]
    LlmError,
}

/// Ledger entry describing how one agent's vote was counted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContribution {
    pub action: SignalAction,
    pub raw_confidence: f64,
    pub adjusted_confidence: f64,
    pub weight: f64,
    pub weighted_confidence: f64,
}

/// Weighted totals per externally visible action (NEUTRAL merged into HOLD)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ActionScores {
    pub buy: f64,
    pub sell: f64,
    pub hold: f64,
}

/// A high-confidence directional vote taking part in a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingVote {
    pub agent: String,
    pub action: SignalAction,
    pub confidence: f64,
}

/// Structured, non-fatal observations made while building a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MissingWeight { agent: String },
    MissingField { agent: String, field: String },
    SanityRejected { agent_key: String, reason: String },
    UnknownAgentKey { agent_key: String },
    ConfidenceClamped { agent: String, original: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingWeight { agent } => {
                write!(f, "no weight configured for {}, using 1.0", agent)
            }
            Diagnostic::MissingField { agent, field } => {
                write!(f, "{} payload is missing '{}'", agent, field)
            }
            Diagnostic::SanityRejected { agent_key, reason } => {
                write!(f, "{} rejected by sanity check: {}", agent_key, reason)
            }
            Diagnostic::UnknownAgentKey { agent_key } => {
                write!(f, "unrecognized analysis key '{}'", agent_key)
            }
            Diagnostic::ConfidenceClamped { agent, original } => {
                write!(f, "{} confidence {} clamped to [0, 100]", agent, original)
            }
        }
    }
}

/// Final decision handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub interval: String,
    pub action: DecisionAction,
    pub final_signal: DecisionAction,
    pub confidence: f64,
    pub directional_confidence: f64,
    pub normalized_confidence: f64,
    pub reasoning: String,
    pub agent_contributions: BTreeMap<String, AgentContribution>,
    pub action_scores: ActionScores,
    pub contributing_agents: Vec<String>,
    pub conflict_score: f64,
    pub has_conflict: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_agents: Vec<ConflictingVote>,
    pub decision_method: DecisionMethod,
    #[serde(default)]
    pub insufficient_data_agents: Vec<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// A HOLD with zero confidence and an empty ledger
    pub fn safe_hold(
        symbol: &str,
        interval: &str,
        method: DecisionMethod,
        reasoning: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            action: DecisionAction::Hold,
            final_signal: DecisionAction::Hold,
            confidence: 0.0,
            directional_confidence: 0.0,
            normalized_confidence: 0.0,
            reasoning: reasoning.into(),
            agent_contributions: BTreeMap::new(),
            action_scores: ActionScores::default(),
            contributing_agents: Vec::new(),
            conflict_score: 0.0,
            has_conflict: false,
            conflicting_agents: Vec::new(),
            decision_method: method,
            insufficient_data_agents: Vec::new(),
            error: false,
            error_type: None,
            diagnostics: Vec::new(),
            timestamp,
        }
    }

    /// Mark the decision as an error outcome
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.error = true;
        self.error_type = Some(kind);
        self
    }
}

/// Conflict record handed to a `ConflictSink`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub symbol: String,
    pub interval: String,
    pub final_signal: DecisionAction,
    pub confidence: f64,
    pub reasoning: String,
    pub agent_scores: BTreeMap<String, AgentContribution>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ConflictEvent {
    pub fn from_decision(decision: &Decision) -> Self {
        Self {
            symbol: decision.symbol.clone(),
            interval: decision.interval.clone(),
            final_signal: decision.final_signal,
            confidence: decision.confidence,
            reasoning: decision.reasoning.clone(),
            agent_scores: decision.agent_contributions.clone(),
            metadata: serde_json::json!({
                "conflict_score": decision.conflict_score,
                "conflicting_agents": decision.conflicting_agents,
                "action_scores": decision.action_scores,
                "normalized_confidence": decision.normalized_confidence,
                "directional_confidence": decision.directional_confidence,
                "decision_method": decision.decision_method,
            }),
            timestamp: decision.timestamp,
        }
    }
}
