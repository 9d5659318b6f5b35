use serde::{Deserialize, Serialize};
use signal_core::{DecisionError, DecisionResult, AGENT_TABLE};
use std::collections::BTreeMap;
use std::env;

/// Immutable engine configuration, shared across decision calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vote multiplier per canonical agent name
    pub agent_weights: BTreeMap<String, f64>,
    /// Minimum confidence (0-100) for a BUY/SELL to survive the gate
    pub confidence_threshold: f64,
    /// Adjusted confidence at or above which a directional vote counts as high-confidence
    pub high_confidence_threshold: f64,
    /// Surface opposing high-confidence votes as CONFLICTED instead of resolving by majority
    pub allow_conflict_state: bool,
    pub default_symbol: String,
    pub default_interval: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_weights: AGENT_TABLE
                .iter()
                .map(|(_, name)| (name.to_string(), 1.0))
                .collect(),
            confidence_threshold: 70.0,
            high_confidence_threshold: 80.0,
            allow_conflict_state: true,
            default_symbol: "BTCUSDT".to_string(),
            default_interval: "1h".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults for anything unset.
    pub fn from_env() -> DecisionResult<Self> {
        let defaults = Self::default();

        let agent_weights = match env::var("AGENT_WEIGHTS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let mut weights = defaults.agent_weights.clone();
                weights.extend(parse_weights(&raw)?);
                weights
            }
            _ => defaults.agent_weights,
        };

        let config = Self {
            agent_weights,
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?,
            high_confidence_threshold: env_or(
                "HIGH_CONFIDENCE_THRESHOLD",
                defaults.high_confidence_threshold,
            )?,
            allow_conflict_state: env_or("ALLOW_CONFLICT_STATE", defaults.allow_conflict_state)?,
            default_symbol: env::var("DEFAULT_SYMBOL").unwrap_or(defaults.default_symbol),
            default_interval: env::var("DEFAULT_INTERVAL").unwrap_or(defaults.default_interval),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DecisionResult<()> {
        for (agent, weight) in &self.agent_weights {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(DecisionError::Validation(format!(
                    "weight for {} must be a positive number, got {}",
                    agent, weight
                )));
            }
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("high_confidence_threshold", self.high_confidence_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(DecisionError::Validation(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn weight_for(&self, agent_name: &str) -> Option<f64> {
        self.agent_weights.get(agent_name).copied()
    }

    pub fn with_weight(mut self, agent_name: &str, weight: f64) -> Self {
        self.agent_weights.insert(agent_name.to_string(), weight);
        self
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> DecisionResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DecisionError::Validation(format!("{} has an invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

/// Parse `Name=1.2,Other=0.8` into a weight map.
pub fn parse_weights(raw: &str) -> DecisionResult<BTreeMap<String, f64>> {
    let mut weights = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            DecisionError::Validation(format!("agent weight '{}' is not NAME=VALUE", pair))
        })?;
        let weight: f64 = value.trim().parse().map_err(|_| {
            DecisionError::Validation(format!("agent weight '{}' has a non-numeric value", pair))
        })?;
        weights.insert(name.trim().to_string(), weight);
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.confidence_threshold, 70.0);
        assert_eq!(config.high_confidence_threshold, 80.0);
        assert!(config.allow_conflict_state);
        assert_eq!(config.weight_for("LiquidityAnalystAgent"), Some(1.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_weights() {
        let weights = parse_weights("TechnicalAnalystAgent=1.2, SentimentAnalystAgent=0.8").unwrap();
        assert_eq!(weights["TechnicalAnalystAgent"], 1.2);
        assert_eq!(weights["SentimentAnalystAgent"], 0.8);
        assert!(parse_weights("TechnicalAnalystAgent").is_err());
        assert!(parse_weights("TechnicalAnalystAgent=heavy").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EngineConfig::default().with_weight("TechnicalAnalystAgent", 0.0);
        assert!(config.validate().is_err());

        let config = EngineConfig {
            confidence_threshold: 140.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"confidence_threshold": 60, "allow_conflict_state": false}"#).unwrap();
        assert_eq!(config.confidence_threshold, 60.0);
        assert!(!config.allow_conflict_state);
        assert_eq!(config.high_confidence_threshold, 80.0);
    }
}
