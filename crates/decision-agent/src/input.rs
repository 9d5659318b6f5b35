use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// One decision request read from disk or stdin
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub analyses: Value,
}

#[derive(Deserialize)]
struct Envelope {
    symbol: Option<String>,
    interval: Option<String>,
    analyses: Value,
}

/// Accept either `{"symbol", "interval", "analyses": {..}}` or a bare analyses map.
pub fn parse_request(raw: &str) -> Result<DecisionRequest> {
    let document: Value = serde_json::from_str(raw).context("input is not valid JSON")?;

    let Some(obj) = document.as_object() else {
        bail!("input must be a JSON object");
    };

    if obj.get("analyses").map(Value::is_object).unwrap_or(false) {
        let envelope: Envelope =
            serde_json::from_value(document).context("malformed request envelope")?;
        return Ok(DecisionRequest {
            symbol: envelope.symbol.filter(|s| !s.trim().is_empty()),
            interval: envelope.interval.filter(|s| !s.trim().is_empty()),
            analyses: envelope.analyses,
        });
    }

    Ok(DecisionRequest {
        symbol: None,
        interval: None,
        analyses: document,
    })
}
