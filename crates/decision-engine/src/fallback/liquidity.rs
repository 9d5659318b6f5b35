use serde_json::{Map, Value};
use signal_core::DecisionAction;

use super::FallbackVerdict;
use crate::sanity::parse_confidence;

/// Minimum |bid/ask imbalance| that counts as directional pressure
const IMBALANCE_TRIGGER: f64 = 0.2;
/// Scores under this are treated as thin markets
const THIN_MARKET_SCORE: f64 = 30.0;
const DEFAULT_SCORE: f64 = 50.0;
const PASSIVE_CONFIDENCE_CAP: f64 = 50.0;
const DIRECTIONAL_CONFIDENCE_CAP: f64 = 95.0;

/// Liquidity fields the rules read
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityReading {
    pub overall_liquidity: Option<String>,
    /// Positive when bids outweigh asks
    pub bid_ask_imbalance: Option<f64>,
    pub liquidity_score: f64,
}

impl LiquidityReading {
    /// Read fields from the payload root or from an `analysis`/`metrics`/`data` section.
    pub fn from_payload(payload: &Value) -> Self {
        let empty = Map::new();
        let root = payload.as_object().unwrap_or(&empty);
        let sections: Vec<&Map<String, Value>> = std::iter::once(root)
            .chain(
                ["analysis", "metrics", "data"]
                    .iter()
                    .filter_map(|key| root.get(*key).and_then(Value::as_object)),
            )
            .collect();
        let find = |field: &str| sections.iter().find_map(|s| s.get(field).filter(|v| !v.is_null()));

        Self {
            overall_liquidity: find("overall_liquidity")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_ascii_lowercase()),
            bid_ask_imbalance: find("bid_ask_imbalance")
                .and_then(parse_confidence)
                .filter(|v| v.is_finite()),
            liquidity_score: find("liquidity_score")
                .and_then(parse_confidence)
                .filter(|v| v.is_finite())
                .unwrap_or(DEFAULT_SCORE)
                .clamp(0.0, 100.0),
        }
    }

    fn is_thin(&self) -> bool {
        matches!(self.overall_liquidity.as_deref(), Some("low") | Some("very_low") | Some("very low"))
            || self.liquidity_score < THIN_MARKET_SCORE
    }
}

/// Derive an action from liquidity alone. Confidence never exceeds the liquidity score.
pub fn decide(reading: &LiquidityReading) -> FallbackVerdict {
    let score = reading.liquidity_score;
    let imbalance = reading.bid_ask_imbalance.unwrap_or(0.0);
    let overall = reading.overall_liquidity.as_deref().unwrap_or("unknown");

    if reading.is_thin() {
        return FallbackVerdict {
            action: DecisionAction::Hold,
            confidence: score.min(PASSIVE_CONFIDENCE_CAP),
            reasoning: format!(
                "Liquidity-only decision: market too thin to act (overall {}, score {:.0})",
                overall, score
            ),
        };
    }

    let action = if imbalance >= IMBALANCE_TRIGGER {
        DecisionAction::Buy
    } else if imbalance <= -IMBALANCE_TRIGGER {
        DecisionAction::Sell
    } else {
        DecisionAction::Hold
    };

    let confidence = match action {
        DecisionAction::Buy | DecisionAction::Sell => (50.0 + imbalance.abs() * 100.0)
            .min(DIRECTIONAL_CONFIDENCE_CAP)
            .min(score),
        _ => score.min(PASSIVE_CONFIDENCE_CAP),
    };

    FallbackVerdict {
        action,
        confidence,
        reasoning: format!(
            "Liquidity-only decision: {} (overall {}, bid/ask imbalance {:+.2}, score {:.0})",
            action, overall, imbalance, score
        ),
    }
}
