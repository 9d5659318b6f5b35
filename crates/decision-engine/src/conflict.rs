use signal_core::{ConflictingVote, SignalAction};

use crate::aggregator::{Aggregation, VoteTally};

/// Conflict metadata derived from an aggregation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictState {
    pub has_conflict: bool,
    /// 0-100, higher when the top two buckets are closer together
    pub conflict_score: f64,
    /// High-confidence BUY and SELL votes, in vote order
    pub opposing: Vec<ConflictingVote>,
}

/// Flag a conflict when at least one BUY and one SELL vote reach `high_confidence_threshold`
/// (compared against adjusted confidence).
pub fn detect(aggregation: &Aggregation, high_confidence_threshold: f64) -> ConflictState {
    let opposing: Vec<ConflictingVote> = aggregation
        .votes
        .iter()
        .filter(|v| v.input.action.is_directional() && v.adjusted_confidence >= high_confidence_threshold)
        .map(|v| ConflictingVote {
            agent: v.input.agent_name.clone(),
            action: v.input.action,
            confidence: v.adjusted_confidence,
        })
        .collect();

    let has_buy = opposing.iter().any(|v| v.action == SignalAction::Buy);
    let has_sell = opposing.iter().any(|v| v.action == SignalAction::Sell);
    let has_conflict = has_buy && has_sell;

    ConflictState {
        has_conflict,
        conflict_score: conflict_score(&aggregation.tally),
        opposing: if has_conflict { opposing } else { Vec::new() },
    }
}

/// `100 - (top - second) / total * 100`; 0 when fewer than two buckets received weight.
pub fn conflict_score(tally: &VoteTally) -> f64 {
    let total = tally.total_weighted();
    let ranked = tally.ranked();
    if total <= 0.0 || ranked.iter().filter(|(_, w)| *w > 0.0).count() < 2 {
        return 0.0;
    }
    let gap = ranked[0].1 - ranked[1].1;
    (100.0 - gap / total * 100.0).clamp(0.0, 100.0)
}

/// Reasoning line listing the opposing contributors per side
pub fn describe(opposing: &[ConflictingVote]) -> String {
    let side = |action: SignalAction| {
        opposing
            .iter()
            .filter(|v| v.action == action)
            .map(|v| format!("{} ({:.0}%)", v.agent, v.confidence))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Conflicting high-confidence signals: BUY: {}; SELL: {}",
        side(SignalAction::Buy),
        side(SignalAction::Sell)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::config::EngineConfig;
    use signal_core::{AnalysisInput, AnalysisStatus, Bucket};

    fn input(agent: &str, action: SignalAction, confidence: f64) -> AnalysisInput {
        AnalysisInput {
            agent_key: agent.to_string(),
            agent_name: agent.to_string(),
            action,
            confidence,
            status: AnalysisStatus::Success,
            error_type: None,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_detects_opposing_high_confidence() {
        let agg = aggregate(
            &[
                input("TechnicalAnalystAgent", SignalAction::Buy, 90.0),
                input("SentimentAnalystAgent", SignalAction::Sell, 85.0),
                input("LiquidityAnalystAgent", SignalAction::Buy, 60.0),
            ],
            &EngineConfig::default(),
        )
        .unwrap()
        .unwrap();
        let state = detect(&agg, 80.0);
        assert!(state.has_conflict);
        assert_eq!(state.opposing.len(), 2);
        assert_eq!(
            describe(&state.opposing),
            "Conflicting high-confidence signals: BUY: TechnicalAnalystAgent (90%); SELL: SentimentAnalystAgent (85%)"
        );
    }

    #[test]
    fn test_one_sided_high_confidence_is_not_a_conflict() {
        let agg = aggregate(
            &[
                input("TechnicalAnalystAgent", SignalAction::Buy, 90.0),
                input("SentimentAnalystAgent", SignalAction::Sell, 79.0),
            ],
            &EngineConfig::default(),
        )
        .unwrap()
        .unwrap();
        let state = detect(&agg, 80.0);
        assert!(!state.has_conflict);
        assert!(state.opposing.is_empty());
        assert!(state.conflict_score > 0.0);
    }

    #[test]
    fn test_conflict_score() {
        let mut tally = VoteTally::default();
        assert_eq!(conflict_score(&tally), 0.0);

        tally.add(Bucket::Buy, 90.0, 90.0);
        assert_eq!(conflict_score(&tally), 0.0);

        tally.add(Bucket::Sell, 90.0, 90.0);
        assert_eq!(conflict_score(&tally), 100.0);

        tally.add(Bucket::Hold, 20.0, 20.0);
        // top 90, second 90, total 200
        assert_eq!(conflict_score(&tally), 100.0);

        let mut lopsided = VoteTally::default();
        lopsided.add(Bucket::Buy, 75.0, 75.0);
        lopsided.add(Bucket::Sell, 25.0, 25.0);
        assert!((conflict_score(&lopsided) - 50.0).abs() < 1e-9);
    }
}
