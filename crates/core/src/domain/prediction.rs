use crate::domain::metrics::MetricKind;
use crate::domain::recommendation::RecommendedAction;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// A recommendation frozen at issue time so it can later be reconciled
/// against what the metrics actually did. Written once at emission, mutated
/// exactly once by the verifier.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub id: Uuid,
    pub client_id: String,
    pub campaign_id: String,
    pub issued_on: NaiveDate,
    pub action: RecommendedAction,
    pub predicted_metric: MetricKind,
    pub predicted_change_pct: f64,
    pub confidence: f64,
    pub actual_change_pct: Option<f64>,
    pub verified: bool,
}

impl Prediction {
    /// Directional hit or miss; `None` while unverified.
    pub fn directional_success(&self) -> Option<bool> {
        if !self.verified {
            return None;
        }
        let actual = self.actual_change_pct?;
        Some(sign(actual) == sign(self.predicted_change_pct))
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(predicted: f64, actual: Option<f64>, verified: bool) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            campaign_id: "spring_sale".to_string(),
            issued_on: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            action: RecommendedAction::RefreshCreative,
            predicted_metric: MetricKind::Ctr,
            predicted_change_pct: predicted,
            confidence: 0.6,
            actual_change_pct: actual,
            verified,
        }
    }

    #[test]
    fn success_is_directional_only() {
        // Predicted +20, realized +30: same sign, magnitude ignored.
        assert_eq!(
            prediction(20.0, Some(30.0), true).directional_success(),
            Some(true)
        );
        assert_eq!(
            prediction(20.0, Some(-5.0), true).directional_success(),
            Some(false)
        );
        assert_eq!(
            prediction(-15.0, Some(-0.1), true).directional_success(),
            Some(true)
        );
    }

    #[test]
    fn unverified_predictions_have_no_outcome() {
        assert_eq!(prediction(20.0, None, false).directional_success(), None);
    }

    #[test]
    fn flat_outcome_misses_a_nonzero_prediction() {
        assert_eq!(
            prediction(20.0, Some(0.0), true).directional_success(),
            Some(false)
        );
    }
}
