use chrono::{DateTime, Utc};
use signal_core::{Decision, DecisionAction, DecisionMethod, Diagnostic};
use std::collections::BTreeMap;

use crate::aggregator::Aggregation;
use crate::config::EngineConfig;
use crate::conflict::{self, ConflictState};
use crate::gate;

/// Minimum confidence reported for a CONFLICTED decision
pub const CONFLICT_CONFIDENCE_FLOOR: f64 = 80.0;

/// Action, confidence and explanation chosen for a decision
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub action: DecisionAction,
    pub confidence: f64,
    pub reasoning: String,
}

/// Per-call facts that are not part of the vote itself
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub symbol: String,
    pub interval: String,
    pub insufficient_data_agents: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub timestamp: DateTime<Utc>,
}

/// Turn an aggregation into an action: conflict surfacing first, then majority plus threshold gate.
pub fn resolve(aggregation: &Aggregation, conflict: &ConflictState, config: &EngineConfig) -> Resolution {
    if conflict.has_conflict && config.allow_conflict_state {
        return Resolution {
            action: DecisionAction::Conflicted,
            confidence: aggregation.normalized_confidence.max(CONFLICT_CONFIDENCE_FLOOR),
            reasoning: conflict::describe(&conflict.opposing),
        };
    }

    let majority = DecisionAction::from(aggregation.dominant);
    let gated = gate::apply_threshold(majority, aggregation.final_confidence, config.confidence_threshold);
    let mut reasoning = gated
        .downgrade_reason
        .unwrap_or_else(|| summarize(aggregation));

    if conflict.has_conflict {
        reasoning.push_str(&format!(
            ". Conflicting signals detected, but {} has predominant consensus",
            majority
        ));
    }

    Resolution {
        action: gated.action,
        confidence: gated.confidence,
        reasoning,
    }
}

fn summarize(aggregation: &Aggregation) -> String {
    let dominant = aggregation.dominant;
    format!(
        "{} has the strongest weighted support ({:.1} of {:.1}) from {} of {} agents; directional {:.1}%, normalized {:.1}%",
        dominant,
        aggregation.tally.weighted(dominant),
        aggregation.tally.total_weighted(),
        aggregation.tally.get(dominant).count,
        aggregation.tally.vote_count(),
        aggregation.directional_confidence,
        aggregation.normalized_confidence
    )
}

/// "Note: Insufficient data from …" for the given agents, if any
pub fn insufficient_note(agents: &[String]) -> Option<String> {
    if agents.is_empty() {
        None
    } else {
        Some(format!("Note: Insufficient data from {}", agents.join(", ")))
    }
}

/// Assemble the immutable decision record.
pub fn compose(
    ctx: DecisionContext,
    aggregation: Option<&Aggregation>,
    conflict: Option<&ConflictState>,
    resolution: Resolution,
    method: DecisionMethod,
) -> Decision {
    let mut reasoning = resolution.reasoning;
    if let Some(note) = insufficient_note(&ctx.insufficient_data_agents) {
        reasoning = format!("{}. {}", reasoning.trim_end_matches('.'), note);
    }

    let mut diagnostics = ctx.diagnostics;
    let (agent_contributions, action_scores, contributing_agents, directional, normalized) = match aggregation {
        Some(agg) => {
            diagnostics.extend(agg.diagnostics.iter().cloned());
            let contributing: Vec<String> = agg
                .votes
                .iter()
                .filter(|v| resolution.action.matches(v.input.action))
                .map(|v| v.input.agent_name.clone())
                .collect();
            (
                agg.contributions(),
                agg.tally.action_scores(),
                contributing,
                agg.directional_confidence,
                agg.normalized_confidence,
            )
        }
        None => (BTreeMap::new(), Default::default(), Vec::new(), 0.0, 0.0),
    };

    let (has_conflict, conflict_score, conflicting_agents) = match conflict {
        Some(state) => (state.has_conflict, state.conflict_score, state.opposing.clone()),
        None => (false, 0.0, Vec::new()),
    };

    Decision {
        symbol: ctx.symbol,
        interval: ctx.interval,
        action: resolution.action,
        final_signal: resolution.action,
        confidence: resolution.confidence.clamp(0.0, 100.0),
        directional_confidence: directional,
        normalized_confidence: normalized,
        reasoning,
        agent_contributions,
        action_scores,
        contributing_agents,
        conflict_score,
        has_conflict,
        conflicting_agents,
        decision_method: method,
        insufficient_data_agents: ctx.insufficient_data_agents,
        error: false,
        error_type: None,
        diagnostics,
        timestamp: ctx.timestamp,
    }
}
