use crate::config::EngineConfig;
use crate::domain::metrics::{pct_change, MetricSnapshot};
use crate::domain::prediction::Prediction;
use crate::storage::{self, StorageError};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub total_predictions: usize,
    pub verified: usize,
    pub successes: usize,
    /// `successes / verified * 100`; absent until something has verified.
    pub accuracy_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub client_id: String,
    pub checked: usize,
    pub newly_verified: usize,
    pub accuracy: AccuracyReport,
}

/// Realized change for one prediction, if the history supports a reading:
/// "before" is the latest snapshot strictly before the issue date, "after"
/// the earliest snapshot at least `settle_days` later. A zero or missing
/// before-value means no reading.
pub fn reconcile(
    prediction: &Prediction,
    history: &[MetricSnapshot],
    settle_days: i64,
) -> Option<f64> {
    let before = history
        .iter()
        .filter(|s| s.date < prediction.issued_on)
        .last()?;
    let earliest_after = prediction.issued_on + Duration::days(settle_days);
    let after = history.iter().find(|s| s.date >= earliest_after)?;

    let before_value = prediction.predicted_metric.value_in(before)?;
    let after_value = prediction.predicted_metric.value_in(after)?;
    pct_change(before_value, after_value)
}

/// Accuracy over a prediction set. Unverified predictions are excluded from
/// the percentage, not counted as failures.
pub fn accuracy_of(predictions: &[Prediction]) -> AccuracyReport {
    let verified: Vec<_> = predictions.iter().filter(|p| p.verified).collect();
    let successes = verified
        .iter()
        .filter(|p| p.directional_success() == Some(true))
        .count();
    let accuracy_pct = if verified.is_empty() {
        None
    } else {
        Some(successes as f64 / verified.len() as f64 * 100.0)
    };
    AccuracyReport {
        total_predictions: predictions.len(),
        verified: verified.len(),
        successes,
        accuracy_pct,
    }
}

/// Weekly reconciliation pass: settle every unverified prediction issued in
/// the trailing window, then report accuracy over the whole book.
pub async fn verify_recent(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    client_id: &str,
    today: NaiveDate,
) -> Result<VerificationReport, StorageError> {
    let since = today - Duration::days(cfg.verification.window_days);
    let pending =
        storage::predictions::load_unverified_issued_since(pool, client_id, since).await?;

    let mut newly_verified = 0usize;
    for prediction in &pending {
        let history = storage::history::load_campaign_or_empty(
            pool,
            client_id,
            &prediction.campaign_id,
            cfg.retention_days,
            today,
        )
        .await?;

        if let Some(actual_change_pct) =
            reconcile(prediction, &history, cfg.verification.settle_days)
        {
            storage::predictions::mark_verified(pool, prediction.id, actual_change_pct).await?;
            newly_verified += 1;
            tracing::info!(
                client_id,
                campaign_id = %prediction.campaign_id,
                metric = prediction.predicted_metric.as_str(),
                predicted = prediction.predicted_change_pct,
                actual = actual_change_pct,
                "prediction reconciled"
            );
        }
    }

    let all = storage::predictions::load_for_client(pool, client_id).await?;
    Ok(VerificationReport {
        client_id: client_id.to_string(),
        checked: pending.len(),
        newly_verified,
        accuracy: accuracy_of(&all),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::MetricKind;
    use crate::domain::recommendation::RecommendedAction;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn snapshot(date: NaiveDate, ctr: f64) -> MetricSnapshot {
        MetricSnapshot {
            date,
            campaign_id: "spring_sale".to_string(),
            client_id: "acme".to_string(),
            platform: "meta".to_string(),
            spend: 100.0,
            impressions: 5_000,
            clicks: 60,
            ctr,
            cpc: 1.0,
            roas: None,
            frequency: None,
            conversions: None,
            actions_taken: Vec::new(),
        }
    }

    fn prediction(issued_on: NaiveDate, predicted_change_pct: f64) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            campaign_id: "spring_sale".to_string(),
            issued_on,
            action: RecommendedAction::RefreshCreative,
            predicted_metric: MetricKind::Ctr,
            predicted_change_pct,
            confidence: 0.6,
            actual_change_pct: None,
            verified: false,
        }
    }

    #[test]
    fn reconciles_before_and_settled_after() {
        // Issued on the 10th predicting CTR +20; CTR went 1.0 -> 1.3, a +30%
        // move in the predicted direction.
        let history = vec![
            snapshot(day(8), 0.9),
            snapshot(day(9), 1.0),
            snapshot(day(12), 1.3),
        ];
        let p = prediction(day(10), 20.0);
        let actual = reconcile(&p, &history, 2).unwrap();
        assert!((actual - 30.0).abs() < 1e-9);

        let mut verified = p;
        verified.actual_change_pct = Some(actual);
        verified.verified = true;
        assert_eq!(verified.directional_success(), Some(true));
    }

    #[test]
    fn after_snapshot_must_clear_the_settle_window() {
        // Only a next-day snapshot exists; two settle days means no reading.
        let history = vec![snapshot(day(9), 1.0), snapshot(day(11), 1.3)];
        let p = prediction(day(10), 20.0);
        assert_eq!(reconcile(&p, &history, 2), None);
    }

    #[test]
    fn missing_before_or_zero_base_yields_no_reading() {
        let p = prediction(day(10), 20.0);

        let only_after = vec![snapshot(day(12), 1.3)];
        assert_eq!(reconcile(&p, &only_after, 2), None);

        let zero_base = vec![snapshot(day(9), 0.0), snapshot(day(12), 1.3)];
        assert_eq!(reconcile(&p, &zero_base, 2), None);
    }

    #[test]
    fn accuracy_excludes_unverified_predictions() {
        let mut hit = prediction(day(5), 20.0);
        hit.actual_change_pct = Some(12.0);
        hit.verified = true;
        let mut miss = prediction(day(5), 20.0);
        miss.actual_change_pct = Some(-3.0);
        miss.verified = true;
        let pending = prediction(day(9), 20.0);

        let report = accuracy_of(&[hit, miss, pending]);
        assert_eq!(report.total_predictions, 3);
        assert_eq!(report.verified, 2);
        assert_eq!(report.successes, 1);
        assert_eq!(report.accuracy_pct, Some(50.0));
    }

    #[test]
    fn accuracy_is_absent_with_nothing_verified() {
        let report = accuracy_of(&[prediction(day(9), 20.0)]);
        assert_eq!(report.accuracy_pct, None);
    }
}
