use signal_core::{AnalysisStatus, ErrorType, SignalAction};

const UNKNOWN_CAP: f64 = 10.0;
const INSUFFICIENT_DATA_CAP: f64 = 30.0;
const API_ERROR_CAP: f64 = 10.0;
const GENERIC_ERROR_CAP: f64 = 5.0;
const PASSIVE_FLOOR: f64 = 30.0;
const DIRECTIONAL_FLOOR: f64 = 15.0;

/// Adjust a raw confidence. Caps run before floors; floors only apply to successful analyses,
/// so an error cap is never undone.
pub fn adjust(
    action: SignalAction,
    raw_confidence: f64,
    status: AnalysisStatus,
    error_type: Option<&ErrorType>,
) -> f64 {
    let mut confidence = if raw_confidence.is_nan() { 0.0 } else { raw_confidence };

    if action == SignalAction::Unknown {
        confidence = confidence.min(UNKNOWN_CAP);
    }

    if status == AnalysisStatus::Error {
        confidence = match error_type {
            Some(ErrorType::InsufficientData) => confidence.min(INSUFFICIENT_DATA_CAP),
            Some(ErrorType::DataFetcherMissing) => 0.0,
            Some(ErrorType::ApiError) | Some(ErrorType::ApiKeyError) => confidence.min(API_ERROR_CAP),
            _ => confidence.min(GENERIC_ERROR_CAP),
        };
    } else {
        match action {
            SignalAction::Hold | SignalAction::Neutral => confidence = confidence.max(PASSIVE_FLOOR),
            SignalAction::Buy | SignalAction::Sell => confidence = confidence.max(DIRECTIONAL_FLOOR),
            SignalAction::Unknown => {}
        }
    }

    confidence.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [f64; 9] = [-20.0, 0.0, 5.0, 14.9, 29.0, 50.0, 80.0, 100.0, 250.0];

    #[test]
    fn test_unknown_never_exceeds_ten() {
        for c in SAMPLES {
            assert!(adjust(SignalAction::Unknown, c, AnalysisStatus::Success, None) <= 10.0);
            assert!(adjust(SignalAction::Unknown, c, AnalysisStatus::Error, None) <= 10.0);
        }
    }

    #[test]
    fn test_directional_floor_and_range() {
        for action in [SignalAction::Buy, SignalAction::Sell] {
            for c in SAMPLES {
                let adjusted = adjust(action, c, AnalysisStatus::Success, None);
                assert!((0.0..=100.0).contains(&adjusted));
                if c >= 0.0 {
                    assert!(adjusted >= 15.0, "{} @ {} -> {}", action, c, adjusted);
                }
            }
        }
        assert_eq!(adjust(SignalAction::Buy, 250.0, AnalysisStatus::Success, None), 100.0);
    }

    #[test]
    fn test_passive_floor() {
        assert_eq!(adjust(SignalAction::Hold, 10.0, AnalysisStatus::Success, None), 30.0);
        assert_eq!(adjust(SignalAction::Neutral, 0.0, AnalysisStatus::Success, None), 30.0);
        assert_eq!(adjust(SignalAction::Neutral, 64.0, AnalysisStatus::Success, None), 64.0);
    }

    #[test]
    fn test_error_caps() {
        let err = AnalysisStatus::Error;
        assert_eq!(adjust(SignalAction::Buy, 90.0, err, Some(&ErrorType::InsufficientData)), 30.0);
        assert_eq!(adjust(SignalAction::Buy, 20.0, err, Some(&ErrorType::InsufficientData)), 20.0);
        assert_eq!(adjust(SignalAction::Sell, 90.0, err, Some(&ErrorType::DataFetcherMissing)), 0.0);
        assert_eq!(adjust(SignalAction::Hold, 90.0, err, Some(&ErrorType::ApiError)), 10.0);
        assert_eq!(adjust(SignalAction::Hold, 90.0, err, Some(&ErrorType::ApiKeyError)), 10.0);
        assert_eq!(adjust(SignalAction::Hold, 90.0, err, Some(&ErrorType::Other("TIMEOUT".into()))), 5.0);
        assert_eq!(adjust(SignalAction::Hold, 90.0, err, None), 5.0);
    }

    #[test]
    fn test_error_caps_are_not_refloored() {
        // HOLD floor of 30 must not lift an errored analysis back up
        assert_eq!(adjust(SignalAction::Hold, 2.0, AnalysisStatus::Error, Some(&ErrorType::ApiError)), 2.0);
    }
}
