use signal_core::DecisionAction;

/// Highest confidence a downgraded decision may report
pub const DOWNGRADE_CONFIDENCE_CAP: f64 = 65.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub action: DecisionAction,
    pub confidence: f64,
    /// Set when a BUY/SELL was downgraded to HOLD
    pub downgrade_reason: Option<String>,
}

/// Downgrade BUY/SELL below `threshold` to HOLD. Other actions pass through untouched.
pub fn apply_threshold(action: DecisionAction, confidence: f64, threshold: f64) -> GateOutcome {
    let directional = matches!(action, DecisionAction::Buy | DecisionAction::Sell);
    if directional && confidence < threshold {
        tracing::info!(
            "Downgrading {} to HOLD: confidence {:.1}% below threshold {:.0}%",
            action,
            confidence,
            threshold
        );
        return GateOutcome {
            action: DecisionAction::Hold,
            confidence: confidence.min(DOWNGRADE_CONFIDENCE_CAP),
            downgrade_reason: Some(format!(
                "Confidence below threshold ({:.1}% < {:.0}%)",
                confidence, threshold
            )),
        };
    }

    GateOutcome {
        action,
        confidence,
        downgrade_reason: None,
    }
}
