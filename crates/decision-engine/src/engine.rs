use chrono::{DateTime, Utc};
use serde_json::Value;
use signal_core::{
    AnalysisInput, ConflictEvent, ConflictSink, Decision, DecisionAction, DecisionError,
    DecisionMethod, DecisionResult, Diagnostic, FailureKind, LlmProvider, LIQUIDITY_AGENT,
};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::aggregator;
use crate::composer::{self, DecisionContext, Resolution};
use crate::config::EngineConfig;
use crate::conflict;
use crate::fallback::{liquidity, llm, FallbackVerdict};
use crate::gate;
use crate::normalizer::{self, Normalized};
use crate::sanity;

/// Analyses that survived sanity checks and normalization
#[derive(Debug, Clone, Default)]
pub struct PreparedInputs {
    pub inputs: Vec<AnalysisInput>,
    pub insufficient_data_agents: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Payloads dropped by the sanity check or skipped by the normalizer
    pub rejected: usize,
}

impl PreparedInputs {
    pub fn valid_count(&self) -> usize {
        self.inputs.iter().filter(|i| i.is_success()).count()
    }
}

/// Fuses analyst reports into one decision.
///
/// Holds only immutable configuration and optional collaborators, so one engine can serve
/// concurrent calls for any number of symbols.
#[derive(Clone)]
pub struct DecisionEngine {
    config: Arc<EngineConfig>,
    llm: Option<Arc<dyn LlmProvider>>,
    conflict_sink: Option<Arc<dyn ConflictSink>>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            llm: None,
            conflict_sink: None,
        }
    }

    /// Enable the LLM synthesis fallback
    pub fn with_llm(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(provider);
        self
    }

    /// Send conflict events to this sink
    pub fn with_conflict_sink(mut self, sink: Arc<dyn ConflictSink>) -> Self {
        self.conflict_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide from an untyped analyses document. Anything other than a JSON object
    /// yields a HOLD flagged as a validation error.
    pub async fn decide_value(&self, symbol: Option<&str>, interval: Option<&str>, analyses: &Value) -> Decision {
        let symbol = symbol.unwrap_or(self.config.default_symbol.as_str());
        let interval = interval.unwrap_or(self.config.default_interval.as_str());

        match analyses.as_object() {
            Some(map) => {
                let analyses: BTreeMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                self.decide(symbol, interval, &analyses).await
            }
            None => {
                let err = DecisionError::Validation("analyses must be a JSON object keyed by analysis name".to_string());
                tracing::warn!("Rejecting decision request for {}: {}", symbol, err);
                Decision::safe_hold(symbol, interval, DecisionMethod::ErrorFallback, err.to_string(), Utc::now())
                    .with_failure(FailureKind::ValidationError)
            }
        }
    }

    /// Produce a decision for one symbol/interval snapshot. Never fails; every problem
    /// degrades to a conservative HOLD.
    pub async fn decide(&self, symbol: &str, interval: &str, analyses: &BTreeMap<String, Value>) -> Decision {
        let timestamp = Utc::now();
        tracing::info!("Deciding {} ({}) from {} analyses", symbol, interval, analyses.len());

        if analyses.is_empty() {
            tracing::warn!("No analyses supplied for {} ({})", symbol, interval);
            return Decision::safe_hold(symbol, interval, DecisionMethod::Fallback, "No analyses provided", timestamp)
                .with_failure(FailureKind::MissingData);
        }

        let prepared = self.prepare(analyses);

        let decision = if prepared.inputs.is_empty() {
            tracing::warn!("All {} analyses for {} failed sanity checks", analyses.len(), symbol);
            let mut decision = Decision::safe_hold(
                symbol,
                interval,
                DecisionMethod::Fallback,
                format!("All {} analyses failed sanity checks", prepared.rejected),
                timestamp,
            )
            .with_failure(FailureKind::AllFailedSanityCheck);
            decision.insufficient_data_agents = prepared.insufficient_data_agents;
            decision.diagnostics = prepared.diagnostics;
            decision
        } else if prepared.valid_count() == 0 {
            self.insufficient_data(symbol, interval, prepared, timestamp)
        } else if prepared.valid_count() < 2 {
            self.fallback(symbol, interval, prepared, analyses, timestamp).await
        } else {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.decide_weighted(symbol, interval, &prepared, timestamp)
            }));
            match result {
                Ok(Ok(Some(decision))) => decision,
                Ok(Ok(None)) => self.fallback(symbol, interval, prepared, analyses, timestamp).await,
                Ok(Err(e)) => self.aggregation_failure(symbol, interval, &e.to_string(), timestamp),
                Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                let detail = format!("panic during weighted voting: {}", message);
                self.aggregation_failure(symbol, interval, &detail, timestamp)
            }
            }
        };

        for diagnostic in &decision.diagnostics {
            tracing::debug!("{} ({}): {}", symbol, interval, diagnostic);
        }
        tracing::info!(
            "Decision for {} ({}): {} @ {:.1}% via {:?}",
            symbol,
            interval,
            decision.action,
            decision.confidence,
            decision.decision_method
        );

        if decision.has_conflict {
            self.emit_conflict(&decision);
        }
        decision
    }

    /// Run sanity checks and normalization over every payload.
    pub fn prepare(&self, analyses: &BTreeMap<String, Value>) -> PreparedInputs {
        let mut prepared = PreparedInputs::default();

        for (key, payload) in analyses {
            if let Err(reason) = sanity::check_payload(payload) {
                tracing::warn!("Dropping {} analysis: {}", key, reason);
                prepared.diagnostics.push(Diagnostic::SanityRejected {
                    agent_key: key.clone(),
                    reason,
                });
                prepared.rejected += 1;
                if sanity::reports_insufficient_data(payload) {
                    let (name, _) = signal_core::resolve_agent_name(key);
                    prepared.insufficient_data_agents.push(name);
                }
                continue;
            }

            match normalizer::normalize(key, payload, &mut prepared.diagnostics) {
                Normalized::Vote(input) => {
                    if input.has_insufficient_data() {
                        prepared.insufficient_data_agents.push(input.agent_name.clone());
                    }
                    prepared.inputs.push(input);
                }
                Normalized::Skipped { agent_name } => {
                    tracing::warn!("Skipping {}: no action could be determined", agent_name);
                    prepared.rejected += 1;
                }
            }
        }

        prepared
    }

    /// Weighted voting, conflict handling, threshold gate and composition.
    /// Deterministic for equal inputs and timestamp. `Ok(None)` when nothing can vote.
    pub fn decide_weighted(
        &self,
        symbol: &str,
        interval: &str,
        prepared: &PreparedInputs,
        timestamp: DateTime<Utc>,
    ) -> DecisionResult<Option<Decision>> {
        let Some(aggregation) = aggregator::aggregate(&prepared.inputs, &self.config)? else {
            return Ok(None);
        };

        let conflict_state = conflict::detect(&aggregation, self.config.high_confidence_threshold);
        let resolution = composer::resolve(&aggregation, &conflict_state, &self.config);

        let ctx = DecisionContext {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            insufficient_data_agents: prepared.insufficient_data_agents.clone(),
            diagnostics: prepared.diagnostics.clone(),
            timestamp,
        };

        Ok(Some(composer::compose(
            ctx,
            Some(&aggregation),
            Some(&conflict_state),
            resolution,
            DecisionMethod::WeightedDirectional,
        )))
    }

    async fn fallback(
        &self,
        symbol: &str,
        interval: &str,
        prepared: PreparedInputs,
        analyses: &BTreeMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        let valid: Vec<&AnalysisInput> = prepared.inputs.iter().filter(|i| i.is_success()).collect();
        let aggregation = aggregator::aggregate(&prepared.inputs, &self.config).ok().flatten();

        let (verdict, method) = match valid.as_slice() {
            [only] if only.agent_name == LIQUIDITY_AGENT => {
                tracing::info!("Only the liquidity analysis is usable for {}, using liquidity rules", symbol);
                let payload = analyses.get(&only.agent_key).unwrap_or(&Value::Null);
                let reading = liquidity::LiquidityReading::from_payload(payload);
                (liquidity::decide(&reading), DecisionMethod::LiquidityBased)
            }
            _ => match &self.llm {
                Some(provider) => match llm::synthesize(provider.as_ref(), symbol, interval, analyses).await {
                    Ok(verdict) => (verdict, DecisionMethod::LlmBased),
                    Err(e) => {
                        tracing::warn!("LLM synthesis failed for {}: {}", symbol, e);
                        let ctx = DecisionContext {
                            symbol: symbol.to_string(),
                            interval: interval.to_string(),
                            insufficient_data_agents: prepared.insufficient_data_agents,
                            diagnostics: prepared.diagnostics,
                            timestamp,
                        };
                        return composer::compose(
                            ctx,
                            aggregation.as_ref(),
                            None,
                            Resolution {
                                action: DecisionAction::Hold,
                                confidence: 0.0,
                                reasoning: format!("Holding after LLM synthesis failure: {}", e),
                            },
                            DecisionMethod::ErrorFallback,
                        )
                        .with_failure(FailureKind::LlmError);
                    }
                },
                None => {
                    tracing::warn!(
                        "Only {} valid analyses for {} and no LLM provider configured",
                        valid.len(),
                        symbol
                    );
                    (
                        FallbackVerdict {
                            action: DecisionAction::Hold,
                            confidence: 0.0,
                            reasoning: format!(
                                "Only {} valid analysis available; at least 2 are required for weighted voting",
                                valid.len()
                            ),
                        },
                        DecisionMethod::Fallback,
                    )
                }
            },
        };

        let gated = gate::apply_threshold(verdict.action, verdict.confidence, self.config.confidence_threshold);
        let reasoning = match gated.downgrade_reason {
            Some(reason) => format!("{}. {}", reason, verdict.reasoning),
            None => verdict.reasoning,
        };

        let ctx = DecisionContext {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            insufficient_data_agents: prepared.insufficient_data_agents,
            diagnostics: prepared.diagnostics,
            timestamp,
        };
        composer::compose(
            ctx,
            aggregation.as_ref(),
            None,
            Resolution {
                action: gated.action,
                confidence: gated.confidence,
                reasoning,
            },
            method,
        )
    }

    fn insufficient_data(
        &self,
        symbol: &str,
        interval: &str,
        prepared: PreparedInputs,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        let err = DecisionError::InsufficientData(format!(
            "all {} usable analyses reported errors",
            prepared.inputs.len()
        ));
        tracing::warn!("{} ({}): {}", symbol, interval, err);
        let aggregation = aggregator::aggregate(&prepared.inputs, &self.config).ok().flatten();
        let ctx = DecisionContext {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            insufficient_data_agents: prepared.insufficient_data_agents,
            diagnostics: prepared.diagnostics,
            timestamp,
        };
        composer::compose(
            ctx,
            aggregation.as_ref(),
            None,
            Resolution {
                action: DecisionAction::Hold,
                confidence: 0.0,
                reasoning: err.to_string(),
            },
            DecisionMethod::Fallback,
        )
        .with_failure(FailureKind::InsufficientData)
    }

    fn aggregation_failure(&self, symbol: &str, interval: &str, detail: &str, timestamp: DateTime<Utc>) -> Decision {
        // Captured here, so it shows the recovery site rather than the panic origin
        tracing::error!(
            "Aggregation failed for {} ({}): {}\nhandler backtrace:\n{}",
            symbol,
            interval,
            detail,
            std::backtrace::Backtrace::force_capture()
        );
        Decision::safe_hold(
            symbol,
            interval,
            DecisionMethod::ErrorFallback,
            format!("Holding after aggregation error: {}", detail),
            timestamp,
        )
        .with_failure(FailureKind::AggregationError)
    }

    /// Hand the conflict to the sink without waiting on it.
    fn emit_conflict(&self, decision: &Decision) {
        let Some(sink) = self.conflict_sink.clone() else {
            return;
        };
        let event = ConflictEvent::from_decision(decision);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.record(&event).await {
                        tracing::warn!("Conflict sink {} failed for {}: {}", sink.name(), event.symbol, e);
                    }
                });
            }
            Err(_) => tracing::debug!("No async runtime available, dropping conflict event for {}", event.symbol),
        }
    }
}
