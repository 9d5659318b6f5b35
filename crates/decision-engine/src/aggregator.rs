use signal_core::{
    ActionScores, AgentContribution, AnalysisInput, Bucket, DecisionError, DecisionResult,
    Diagnostic,
};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::confidence;

/// Totals accumulated for one action class
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketTotals {
    pub count: usize,
    pub confidence_sum: f64,
    pub weighted_sum: f64,
}

/// Per-bucket vote accumulator, indexed in BUY, SELL, HOLD, NEUTRAL order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteTally {
    buckets: [BucketTotals; 4],
}

impl VoteTally {
    fn index(bucket: Bucket) -> usize {
        match bucket {
            Bucket::Buy => 0,
            Bucket::Sell => 1,
            Bucket::Hold => 2,
            Bucket::Neutral => 3,
        }
    }

    pub fn add(&mut self, bucket: Bucket, adjusted: f64, weighted: f64) {
        let totals = &mut self.buckets[Self::index(bucket)];
        totals.count += 1;
        totals.confidence_sum += adjusted;
        totals.weighted_sum += weighted;
    }

    pub fn get(&self, bucket: Bucket) -> BucketTotals {
        self.buckets[Self::index(bucket)]
    }

    pub fn weighted(&self, bucket: Bucket) -> f64 {
        self.get(bucket).weighted_sum
    }

    pub fn total_weighted(&self) -> f64 {
        self.buckets.iter().map(|b| b.weighted_sum).sum()
    }

    pub fn directional_weighted(&self) -> f64 {
        self.weighted(Bucket::Buy) + self.weighted(Bucket::Sell)
    }

    pub fn vote_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Bucket with the largest weighted sum; the first maximum in BUY, SELL, HOLD, NEUTRAL order wins.
    pub fn dominant(&self) -> Bucket {
        let mut best = Bucket::Buy;
        for bucket in Bucket::ALL {
            if self.weighted(bucket) > self.weighted(best) {
                best = bucket;
            }
        }
        best
    }

    /// Buckets sorted by weighted sum, descending. Equal sums keep tie-break order.
    pub fn ranked(&self) -> Vec<(Bucket, f64)> {
        let mut ranked: Vec<(Bucket, f64)> = Bucket::ALL.iter().map(|b| (*b, self.weighted(*b))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Totals with NEUTRAL folded into HOLD
    pub fn action_scores(&self) -> ActionScores {
        ActionScores {
            buy: self.weighted(Bucket::Buy),
            sell: self.weighted(Bucket::Sell),
            hold: self.weighted(Bucket::Hold) + self.weighted(Bucket::Neutral),
        }
    }
}

/// A counted vote
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub input: AnalysisInput,
    pub adjusted_confidence: f64,
    pub weight: f64,
    pub weighted_confidence: f64,
}

impl Vote {
    pub fn contribution(&self) -> AgentContribution {
        AgentContribution {
            action: self.input.action,
            raw_confidence: self.input.confidence,
            adjusted_confidence: self.adjusted_confidence,
            weight: self.weight,
            weighted_confidence: self.weighted_confidence,
        }
    }
}

/// Outcome of weighted voting
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub tally: VoteTally,
    pub votes: Vec<Vote>,
    pub dominant: Bucket,
    /// Share of the dominant bucket among BUY and SELL only (0 unless dominant is directional)
    pub directional_confidence: f64,
    /// Share of the dominant bucket among all weighted votes
    pub normalized_confidence: f64,
    /// Directional confidence for BUY/SELL, normalized confidence otherwise
    pub final_confidence: f64,
    pub total_weight: f64,
    pub diagnostics: Vec<Diagnostic>,
}

impl Aggregation {
    pub fn contributions(&self) -> BTreeMap<String, AgentContribution> {
        self.votes
            .iter()
            .map(|v| (v.input.agent_name.clone(), v.contribution()))
            .collect()
    }
}

/// Run weighted voting. `Ok(None)` means there were no usable votes.
pub fn aggregate(inputs: &[AnalysisInput], config: &EngineConfig) -> DecisionResult<Option<Aggregation>> {
    if inputs.is_empty() {
        return Ok(None);
    }

    let mut tally = VoteTally::default();
    let mut votes = Vec::with_capacity(inputs.len());
    let mut diagnostics = Vec::new();
    let mut total_weight = 0.0;

    for input in inputs {
        let weight = match config.weight_for(&input.agent_name) {
            Some(w) => w,
            None => {
                tracing::warn!("No weight configured for {}, defaulting to 1.0", input.agent_name);
                diagnostics.push(Diagnostic::MissingWeight { agent: input.agent_name.clone() });
                1.0
            }
        };
        if !weight.is_finite() {
            return Err(DecisionError::Aggregation(format!(
                "weight for {} is not finite ({})",
                input.agent_name, weight
            )));
        }
        if weight <= 0.0 {
            return Err(DecisionError::Aggregation(format!(
                "weight for {} is not positive ({})",
                input.agent_name, weight
            )));
        }

        let adjusted = confidence::adjust(input.action, input.confidence, input.status, input.error_type.as_ref());
        let weighted = adjusted * weight;
        if !weighted.is_finite() {
            return Err(DecisionError::Aggregation(format!(
                "weighted confidence for {} is not finite ({} x {})",
                input.agent_name, adjusted, weight
            )));
        }

        tally.add(input.action.bucket(), adjusted, weighted);
        total_weight += weight;
        votes.push(Vote {
            input: input.clone(),
            adjusted_confidence: adjusted,
            weight,
            weighted_confidence: weighted,
        });
    }

    let dominant = tally.dominant();
    let dominant_sum = tally.weighted(dominant);

    let total = tally.total_weighted();
    let normalized_confidence = if total > 0.0 {
        (dominant_sum / total * 100.0).min(100.0)
    } else {
        0.0
    };

    let directional_confidence = if dominant.is_directional() {
        let directional_total = tally.directional_weighted();
        if directional_total > 0.0 {
            (dominant_sum / directional_total * 100.0).min(100.0)
        } else if total_weight > 0.0 {
            (dominant_sum / total_weight).min(100.0)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let final_confidence = if dominant.is_directional() {
        directional_confidence
    } else {
        normalized_confidence
    };

    tracing::debug!(
        "Tally BUY={:.1} SELL={:.1} HOLD={:.1} NEUTRAL={:.1} -> {} ({:.1}%)",
        tally.weighted(Bucket::Buy),
        tally.weighted(Bucket::Sell),
        tally.weighted(Bucket::Hold),
        tally.weighted(Bucket::Neutral),
        dominant,
        final_confidence
    );

    Ok(Some(Aggregation {
        tally,
        votes,
        dominant,
        directional_confidence,
        normalized_confidence,
        final_confidence,
        total_weight,
        diagnostics,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{AnalysisStatus, SignalAction};

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

    fn config(weights: &[(&str, f64)]) -> EngineConfig {
        EngineConfig {
            agent_weights: weights.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_empty_input_yields_no_decision() {
        assert_eq!(aggregate(&[], &EngineConfig::default()).unwrap(), None);
    }

    #[test]
    fn test_weighted_buckets_and_directional_share() {
        let cfg = config(&[("Tech", 1.2), ("Sent", 0.8), ("Liq", 1.0)]);
        let inputs = vec![
            input("Tech", SignalAction::Buy, 90.0),
            input("Sent", SignalAction::Sell, 85.0),
            input("Liq", SignalAction::Hold, 60.0),
        ];
        let agg = aggregate(&inputs, &cfg).unwrap().unwrap();
        assert!((agg.tally.weighted(Bucket::Buy) - 108.0).abs() < 1e-9);
        assert!((agg.tally.weighted(Bucket::Sell) - 68.0).abs() < 1e-9);
        assert_eq!(agg.dominant, Bucket::Buy);
        assert!((agg.directional_confidence - 108.0 / 176.0 * 100.0).abs() < 1e-9);
        assert!((agg.normalized_confidence - 108.0 / 236.0 * 100.0).abs() < 1e-9);
        assert_eq!(agg.final_confidence, agg.directional_confidence);
        assert!(agg.diagnostics.is_empty());
    }

    #[test]
    fn test_neutral_is_a_separate_bucket() {
        let cfg = config(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]);
        let inputs = vec![
            input("A", SignalAction::Buy, 70.0),
            input("B", SignalAction::Neutral, 40.0),
            input("C", SignalAction::Hold, 40.0),
        ];
        let agg = aggregate(&inputs, &cfg).unwrap().unwrap();
        assert_eq!(agg.dominant, Bucket::Buy);
        assert_eq!(agg.directional_confidence, 100.0);
        assert_eq!(agg.tally.action_scores().hold, 80.0);
    }

    #[test]
    fn test_tie_break_order() {
        let cfg = config(&[("A", 1.0), ("B", 1.0)]);
        let agg = aggregate(
            &[input("A", SignalAction::Sell, 90.0), input("B", SignalAction::Buy, 90.0)],
            &cfg,
        )
        .unwrap()
        .unwrap();
        assert_eq!(agg.dominant, Bucket::Buy);

        let agg = aggregate(
            &[input("A", SignalAction::Neutral, 60.0), input("B", SignalAction::Hold, 60.0)],
            &cfg,
        )
        .unwrap()
        .unwrap();
        assert_eq!(agg.dominant, Bucket::Hold);
        assert_eq!(agg.final_confidence, 50.0);
    }

    #[test]
    fn test_missing_weight_diagnostic() {
        let agg = aggregate(&[input("Mystery", SignalAction::Buy, 80.0)], &config(&[]))
            .unwrap()
            .unwrap();
        assert_eq!(agg.votes[0].weight, 1.0);
        assert_eq!(agg.diagnostics, vec![Diagnostic::MissingWeight { agent: "Mystery".to_string() }]);
    }

    #[test]
    fn test_zero_directional_total_falls_back_to_total_weight() {
        let mut errored = input("A", SignalAction::Buy, 90.0);
        errored.status = AnalysisStatus::Error;
        errored.error_type = Some(signal_core::ErrorType::DataFetcherMissing);
        let agg = aggregate(&[errored], &config(&[("A", 2.0)])).unwrap().unwrap();
        assert_eq!(agg.dominant, Bucket::Buy);
        assert_eq!(agg.directional_confidence, 0.0);
        assert_eq!(agg.normalized_confidence, 0.0);
    }

    #[test]
    fn test_non_finite_weight_is_an_error() {
        let result = aggregate(&[input("A", SignalAction::Buy, 80.0)], &config(&[("A", f64::INFINITY)]));
        assert!(matches!(result, Err(DecisionError::Aggregation(_))));
    }

    #[test]
    fn test_non_positive_weight_is_an_error() {
        let inputs = [input("A", SignalAction::Buy, 90.0), input("B", SignalAction::Sell, 50.0)];
        for bad in [0.0, -1.0] {
            let result = aggregate(&inputs, &config(&[("A", bad), ("B", 1.0)]));
            match result {
                Err(DecisionError::Aggregation(msg)) => assert!(msg.contains("not positive"), "{}", msg),
                other => panic!("expected aggregation error for weight {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_ranked_keeps_tie_order() {
        let mut tally = VoteTally::default();
        tally.add(Bucket::Hold, 50.0, 50.0);
        tally.add(Bucket::Sell, 50.0, 50.0);
        let ranked = tally.ranked();
        assert_eq!(ranked[0].0, Bucket::Sell);
        assert_eq!(ranked[1].0, Bucket::Hold);
        assert_eq!(tally.vote_count(), 2);
    }
}
