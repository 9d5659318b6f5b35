use serde_json::{Map, Value};
use signal_core::ErrorType;

/// Sub-objects that may carry an action/confidence pair
pub(crate) const NESTED_SECTIONS: [&str; 3] = ["recommendation", "decision", "analysis"];

/// Check that a payload is structurally usable. Returns the rejection reason on failure.
pub fn check_payload(payload: &Value) -> Result<(), String> {
    let obj = payload
        .as_object()
        .ok_or_else(|| format!("payload is {} instead of an object", json_kind(payload)))?;

    check_confidence(obj, "confidence")?;
    for section in NESTED_SECTIONS {
        if let Some(inner) = obj.get(section).and_then(Value::as_object) {
            check_confidence(inner, &format!("{}.confidence", section))?;
        }
    }

    if let Some(status) = obj.get("status") {
        if !status.is_string() && !status.is_null() {
            return Err(format!("status is {} instead of a string", json_kind(status)));
        }
    }

    Ok(())
}

fn check_confidence(obj: &Map<String, Value>, label: &str) -> Result<(), String> {
    match obj.get("confidence") {
        None | Some(Value::Null) => Ok(()),
        Some(value) => match parse_confidence(value) {
            Some(c) if c.is_finite() => Ok(()),
            _ => Err(format!("{} is not a finite number ({})", label, value)),
        },
    }
}

/// Parse a confidence value given as a number or a numeric string (optionally suffixed with '%').
pub(crate) fn parse_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Whether a payload declares `status: error` with `error_type: INSUFFICIENT_DATA`
pub(crate) fn reports_insufficient_data(payload: &Value) -> bool {
    let Some(obj) = payload.as_object() else {
        return false;
    };
    let is_error = obj
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.eq_ignore_ascii_case("error"))
        .unwrap_or(false);
    let error_type = obj
        .get("error_type")
        .and_then(Value::as_str)
        .map(ErrorType::from);
    is_error && error_type == Some(ErrorType::InsufficientData)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_common_shapes() {
        assert!(check_payload(&json!({"action": "BUY", "confidence": 80})).is_ok());
        assert!(check_payload(&json!({"signal": "SELL", "confidence": "72.5%"})).is_ok());
        assert!(check_payload(&json!({"recommendation": {"action": "HOLD", "confidence": null}})).is_ok());
    }

    #[test]
    fn test_rejects_non_objects() {
        let err = check_payload(&json!(["BUY", 80])).unwrap_err();
        assert!(err.contains("an array"));
        assert!(check_payload(&json!("BUY")).is_err());
    }

    #[test]
    fn test_rejects_bad_confidence() {
        assert!(check_payload(&json!({"action": "BUY", "confidence": "very"})).is_err());
        assert!(check_payload(&json!({"action": "BUY", "confidence": true})).is_err());
        let err = check_payload(&json!({"decision": {"action": "BUY", "confidence": [1]}})).unwrap_err();
        assert!(err.starts_with("decision.confidence"));
    }

    #[test]
    fn test_rejects_non_string_status() {
        assert!(check_payload(&json!({"action": "BUY", "status": 1})).is_err());
    }

    #[test]
    fn test_insufficient_data_detection() {
        assert!(reports_insufficient_data(&json!({"status": "error", "error_type": "INSUFFICIENT_DATA"})));
        assert!(!reports_insufficient_data(&json!({"status": "success", "error_type": "INSUFFICIENT_DATA"})));
        assert!(!reports_insufficient_data(&json!({"status": "error", "error_type": "API_ERROR"})));
    }
}
