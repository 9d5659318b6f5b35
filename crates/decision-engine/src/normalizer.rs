use serde_json::{Map, Value};
use signal_core::{
    resolve_agent_name, AnalysisInput, AnalysisStatus, Diagnostic, ErrorType, SignalAction,
};

use crate::sanity::parse_confidence;

/// Confidence cap applied when an analyst reports `signal: UNKNOWN`
const UNKNOWN_SIGNAL_CAP: f64 = 30.0;
/// Confidence assigned when it is missing or the action is unrecognized
const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Where the action of a payload lives
#[derive(Debug)]
enum PayloadShape<'a> {
    /// `{"recommendation": {"action": ..}}`
    Recommendation(&'a Map<String, Value>),
    /// `{"decision": {"action": ..}}`
    Decision(&'a Map<String, Value>),
    /// `{"action": ..}`
    Flat,
    /// `{"analysis": {"action": ..}}`
    Analysis(&'a Map<String, Value>),
    /// `{"signal": ..}`
    Signal,
    /// No recognizable action field
    Missing,
}

impl<'a> PayloadShape<'a> {
    fn detect(obj: &'a Map<String, Value>) -> Self {
        let nested = |key: &str| {
            obj.get(key)
                .and_then(Value::as_object)
                .filter(|inner| inner.contains_key("action"))
        };

        if let Some(inner) = nested("recommendation") {
            PayloadShape::Recommendation(inner)
        } else if let Some(inner) = nested("decision") {
            PayloadShape::Decision(inner)
        } else if obj.contains_key("action") {
            PayloadShape::Flat
        } else if let Some(inner) = nested("analysis") {
            PayloadShape::Analysis(inner)
        } else if obj.contains_key("signal") {
            PayloadShape::Signal
        } else {
            PayloadShape::Missing
        }
    }

    /// The object holding the action (and preferably the confidence)
    fn section(&self, outer: &'a Map<String, Value>) -> &'a Map<String, Value> {
        match self {
            PayloadShape::Recommendation(inner)
            | PayloadShape::Decision(inner)
            | PayloadShape::Analysis(inner) => inner,
            PayloadShape::Flat | PayloadShape::Signal | PayloadShape::Missing => outer,
        }
    }
}

/// Result of normalizing one payload
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Vote(AnalysisInput),
    /// No action could be determined; the agent does not vote
    Skipped { agent_name: String },
}

/// Normalize one analyst payload. Never fails: problems become diagnostics.
pub fn normalize(agent_key: &str, payload: &Value, diagnostics: &mut Vec<Diagnostic>) -> Normalized {
    let (agent_name, known) = resolve_agent_name(agent_key);
    if !known {
        tracing::warn!("Unrecognized analysis key '{}', using it as the agent name", agent_key);
        diagnostics.push(Diagnostic::UnknownAgentKey { agent_key: agent_key.to_string() });
    }

    let Some(obj) = payload.as_object() else {
        return Normalized::Skipped { agent_name };
    };

    let status = parse_status(obj);
    let error_type = obj
        .get("error_type")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ErrorType::from);

    let shape = PayloadShape::detect(obj);
    let section = shape.section(obj);
    let reasoning = text_field(section).or_else(|| text_field(obj));

    let raw_confidence = section
        .get("confidence")
        .or_else(|| obj.get("confidence"))
        .filter(|v| !v.is_null())
        .and_then(parse_confidence)
        .or_else(|| match shape {
            PayloadShape::Flat => nested_confidence(obj),
            _ => None,
        });

    let (action, confidence, generated_reasoning) = match shape {
        PayloadShape::Missing => {
            missing_field(&agent_name, "action", diagnostics);
            if status != AnalysisStatus::Error {
                return Normalized::Skipped { agent_name };
            }
            (SignalAction::Hold, raw_confidence, None)
        }
        PayloadShape::Signal => match obj.get("signal").and_then(Value::as_str).and_then(SignalAction::parse) {
            Some(SignalAction::Unknown) => (
                SignalAction::Hold,
                Some(raw_confidence.unwrap_or(DEFAULT_CONFIDENCE).min(UNKNOWN_SIGNAL_CAP)),
                None,
            ),
            Some(signal) => (signal, raw_confidence, None),
            None => unrecognized(&agent_name, obj.get("signal")),
        },
        _ => match section.get("action").and_then(Value::as_str).and_then(SignalAction::parse) {
            Some(action) => (action, raw_confidence, None),
            None => unrecognized(&agent_name, section.get("action")),
        },
    };

    let mut value = match confidence {
        Some(c) => c,
        None => {
            missing_field(&agent_name, "confidence", diagnostics);
            DEFAULT_CONFIDENCE
        }
    };
    if !(0.0..=100.0).contains(&value) {
        diagnostics.push(Diagnostic::ConfidenceClamped {
            agent: agent_name.clone(),
            original: value,
        });
        value = value.clamp(0.0, 100.0);
    }

    let reasoning = generated_reasoning
        .or(reasoning)
        .unwrap_or_else(|| format!("No reasoning provided by {}", agent_name));

    Normalized::Vote(AnalysisInput {
        agent_key: agent_key.to_string(),
        agent_name,
        action,
        confidence: value,
        status,
        error_type,
        reasoning,
    })
}

/// Confidence carried by an action-less `recommendation`/`decision` object
fn nested_confidence(obj: &Map<String, Value>) -> Option<f64> {
    ["recommendation", "decision"]
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_object))
        .find_map(|inner| inner.get("confidence").filter(|v| !v.is_null()).and_then(parse_confidence))
}

fn missing_field(agent_name: &str, field: &str, diagnostics: &mut Vec<Diagnostic>) {
    tracing::warn!("{} analysis is missing '{}'", agent_name, field);
    diagnostics.push(Diagnostic::MissingField {
        agent: agent_name.to_string(),
        field: field.to_string(),
    });
}

/// Fallback for an action field whose value is not one of the known labels
fn unrecognized(agent_name: &str, raw: Option<&Value>) -> (SignalAction, Option<f64>, Option<String>) {
    let shown = raw.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string());
    tracing::warn!("{} reported unrecognized action {}, treating as NEUTRAL", agent_name, shown);
    (
        SignalAction::Neutral,
        Some(DEFAULT_CONFIDENCE),
        Some(format!(
            "Unrecognized action {} from {}; treated as NEUTRAL",
            shown, agent_name
        )),
    )
}

fn parse_status(obj: &Map<String, Value>) -> AnalysisStatus {
    match obj.get("status").and_then(Value::as_str) {
        Some(s) if s.eq_ignore_ascii_case("error") => AnalysisStatus::Error,
        _ => AnalysisStatus::Success,
    }
}

fn text_field(obj: &Map<String, Value>) -> Option<String> {
    ["reasoning", "reason"]
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vote(key: &str, payload: Value) -> AnalysisInput {
        match normalize(key, &payload, &mut Vec::new()) {
            Normalized::Vote(input) => input,
            other => panic!("expected a vote, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_shape() {
        let input = vote(
            "technical_analysis",
            json!({"action": "BUY", "confidence": 82, "reasoning": "MACD crossover"}),
        );
        assert_eq!(input.agent_name, "TechnicalAnalystAgent");
        assert_eq!(input.action, SignalAction::Buy);
        assert_eq!(input.confidence, 82.0);
        assert_eq!(input.reasoning, "MACD crossover");
        assert!(input.is_success());
    }

    #[test]
    fn test_nested_shapes_take_precedence_in_order() {
        let input = vote(
            "sentiment_analysis",
            json!({
                "recommendation": {"action": "SELL", "confidence": 77},
                "decision": {"action": "BUY", "confidence": 90},
                "action": "HOLD"
            }),
        );
        assert_eq!(input.action, SignalAction::Sell);
        assert_eq!(input.confidence, 77.0);

        let input = vote("sentiment_analysis", json!({"decision": {"action": "buy"}, "confidence": 64}));
        assert_eq!(input.action, SignalAction::Buy);
        assert_eq!(input.confidence, 64.0);

        let input = vote("funding_rate_analysis", json!({"analysis": {"action": "SELL", "confidence": "71%", "reason": "funding spike"}}));
        assert_eq!(input.action, SignalAction::Sell);
        assert_eq!(input.confidence, 71.0);
        assert_eq!(input.reasoning, "funding spike");
    }

    #[test]
    fn test_flat_action_with_nested_confidence() {
        let mut diagnostics = Vec::new();
        let Normalized::Vote(input) = normalize(
            "sentiment_analysis",
            &json!({"action": "SELL", "recommendation": {"confidence": 73}}),
            &mut diagnostics,
        ) else {
            panic!("expected vote");
        };
        assert_eq!(input.action, SignalAction::Sell);
        assert_eq!(input.confidence, 73.0);
        assert!(diagnostics.is_empty());

        let input = vote("sentiment_analysis", json!({"action": "BUY", "confidence": 61, "decision": {"confidence": 90}}));
        assert_eq!(input.confidence, 61.0);
    }

    #[test]
    fn test_signal_mapping() {
        assert_eq!(vote("technical_analysis", json!({"signal": "HOLD", "confidence": 60})).action, SignalAction::Hold);
        assert_eq!(vote("technical_analysis", json!({"signal": "NEUTRAL", "confidence": 60})).action, SignalAction::Neutral);

        let unknown = vote("technical_analysis", json!({"signal": "UNKNOWN", "confidence": 95}));
        assert_eq!(unknown.action, SignalAction::Hold);
        assert_eq!(unknown.confidence, 30.0);
    }

    #[test]
    fn test_unrecognized_action_becomes_neutral() {
        let mut diagnostics = Vec::new();
        let Normalized::Vote(input) = normalize(
            "open_interest_analysis",
            &json!({"action": "MOON", "confidence": 99}),
            &mut diagnostics,
        ) else {
            panic!("expected vote");
        };
        assert_eq!(input.action, SignalAction::Neutral);
        assert_eq!(input.confidence, 50.0);
        assert!(input.reasoning.contains("MOON"));
    }

    #[test]
    fn test_error_without_action_defaults_to_hold() {
        let input = vote(
            "liquidity_analysis",
            json!({"status": "error", "error_type": "API_ERROR", "confidence": 40}),
        );
        assert_eq!(input.action, SignalAction::Hold);
        assert_eq!(input.status, AnalysisStatus::Error);
        assert_eq!(input.error_type, Some(ErrorType::ApiError));
    }

    #[test]
    fn test_missing_action_skips_agent() {
        let mut diagnostics = Vec::new();
        let result = normalize("technical_analysis", &json!({"confidence": 80}), &mut diagnostics);
        assert_eq!(
            result,
            Normalized::Skipped { agent_name: "TechnicalAnalystAgent".to_string() }
        );
        assert!(diagnostics.contains(&Diagnostic::MissingField {
            agent: "TechnicalAnalystAgent".to_string(),
            field: "action".to_string(),
        }));
    }

    #[test]
    fn test_missing_confidence_defaults_and_clamps() {
        let mut diagnostics = Vec::new();
        let Normalized::Vote(input) = normalize("technical_analysis", &json!({"action": "SELL"}), &mut diagnostics) else {
            panic!("expected vote");
        };
        assert_eq!(input.confidence, 50.0);
        assert_eq!(diagnostics.len(), 1);

        let input = vote("technical_analysis", json!({"action": "BUY", "confidence": 140}));
        assert_eq!(input.confidence, 100.0);
        let input = vote("technical_analysis", json!({"action": "BUY", "confidence": -5}));
        assert_eq!(input.confidence, 0.0);
    }

    #[test]
    fn test_unknown_key_diagnostic() {
        let mut diagnostics = Vec::new();
        normalize("whale_alerts", &json!({"action": "BUY", "confidence": 70}), &mut diagnostics);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnknownAgentKey { agent_key: "whale_alerts".to_string() }]
        );
    }
}
