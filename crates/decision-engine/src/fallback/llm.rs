use serde::Deserialize;
use serde_json::Value;
use signal_core::{DecisionAction, DecisionError, DecisionResult, LlmProvider, SignalAction};
use std::collections::BTreeMap;

use super::FallbackVerdict;
use crate::sanity::parse_confidence;

#[derive(Debug, Deserialize)]
struct LlmAnswer {
    action: Value,
    confidence: Value,
    #[serde(default, alias = "reasoning")]
    reason: Option<String>,
}

/// Render the synthesis prompt containing every analysis supplied for this call.
pub fn build_prompt(symbol: &str, interval: &str, analyses: &BTreeMap<String, Value>) -> String {
    let rendered = serde_json::to_string_pretty(analyses).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are the final decision maker for a crypto trading system.\n\
         Symbol: {symbol}\n\
         Interval: {interval}\n\n\
         Fewer than two analyst reports are usable, so weighted voting cannot run. \
         Review the available analyses and decide on a single action.\n\n\
         Analyses:\n{rendered}\n\n\
         Respond with only a JSON object of the form \
         {{\"action\": \"BUY\" | \"SELL\" | \"HOLD\", \"confidence\": <number 0-100>, \"reason\": \"<short explanation>\"}}."
    )
}

/// Parse and validate the model's answer.
pub fn parse_response(raw: &str) -> DecisionResult<FallbackVerdict> {
    let body = extract_json(raw).ok_or_else(|| {
        DecisionError::LlmSynthesis(format!("response contains no JSON object: {}", preview(raw)))
    })?;

    let answer: LlmAnswer = serde_json::from_str(body)
        .map_err(|e| DecisionError::LlmSynthesis(format!("malformed JSON ({}): {}", e, preview(raw))))?;

    let action = answer
        .action
        .as_str()
        .and_then(SignalAction::parse)
        .and_then(|a| match a {
            SignalAction::Buy => Some(DecisionAction::Buy),
            SignalAction::Sell => Some(DecisionAction::Sell),
            SignalAction::Hold | SignalAction::Neutral => Some(DecisionAction::Hold),
            SignalAction::Unknown => None,
        })
        .ok_or_else(|| DecisionError::LlmSynthesis(format!("invalid action {}", answer.action)))?;

    let confidence = parse_confidence(&answer.confidence)
        .filter(|c| c.is_finite() && (0.0..=100.0).contains(c))
        .ok_or_else(|| DecisionError::LlmSynthesis(format!("invalid confidence {}", answer.confidence)))?;

    let reason = answer
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "no reason given".to_string());

    Ok(FallbackVerdict {
        action,
        confidence,
        reasoning: format!("LLM synthesis: {}", reason),
    })
}

/// Ask the provider for a verdict on the given analyses.
pub async fn synthesize(
    provider: &dyn LlmProvider,
    symbol: &str,
    interval: &str,
    analyses: &BTreeMap<String, Value>,
) -> DecisionResult<FallbackVerdict> {
    let prompt = build_prompt(symbol, interval, analyses);
    tracing::info!(
        "Requesting LLM synthesis for {} ({}) via {} backend",
        symbol,
        interval,
        provider.backend_name()
    );
    let raw = provider
        .complete(&prompt)
        .await
        .map_err(|e| DecisionError::LlmSynthesis(e.to_string()))?;
    parse_response(&raw)
}

/// Strip code fences and surrounding prose, returning the outermost `{ ... }` span.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn preview(raw: &str) -> String {
    const MAX: usize = 120;
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
