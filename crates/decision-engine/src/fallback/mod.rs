pub mod liquidity;
pub mod llm;

use signal_core::DecisionAction;

/// Action proposed by a fallback strategy, before the threshold gate
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackVerdict {
    pub action: DecisionAction,
    pub confidence: f64,
    pub reasoning: String,
}
