use crate::config::EngineConfig;
use crate::domain::metrics::{Benchmark, MetricSnapshot};
use crate::storage::{self, StorageError};
use chrono::NaiveDate;
use sqlx::SqlitePool;

/// Arithmetic mean per metric over the entries where that metric is present.
/// No outlier rejection; a noisy day moves the benchmark and that is the
/// documented behavior.
pub fn summarize(snapshots: &[MetricSnapshot], period_days: i64) -> Benchmark {
    Benchmark {
        avg_ctr: mean(snapshots.iter().map(|s| Some(s.ctr))),
        avg_cpc: mean(snapshots.iter().map(|s| Some(s.cpc))),
        avg_roas: mean(snapshots.iter().map(|s| s.roas)),
        avg_frequency: mean(snapshots.iter().map(|s| s.frequency)),
        period_days,
        sample_count: snapshots.len(),
    }
}

pub async fn compute(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    client_id: &str,
    platform: &str,
    lookback_days: Option<i64>,
    today: NaiveDate,
) -> Result<Benchmark, StorageError> {
    let days = lookback_days.unwrap_or(cfg.benchmark_lookback_days);
    let history = storage::history::load_client_or_empty(pool, client_id, days, today).await?;

    let snapshots: Vec<MetricSnapshot> = history
        .into_values()
        .flatten()
        .filter(|s| s.platform == platform)
        .collect();

    Ok(summarize(&snapshots, days))
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values.flatten() {
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ctr: f64, cpc: f64, roas: Option<f64>, frequency: Option<f64>) -> MetricSnapshot {
        MetricSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
            campaign_id: "spring_sale".to_string(),
            client_id: "acme".to_string(),
            platform: "meta".to_string(),
            spend: 100.0,
            impressions: 5_000,
            clicks: 60,
            ctr,
            cpc,
            roas,
            frequency,
            conversions: None,
            actions_taken: Vec::new(),
        }
    }

    #[test]
    fn zero_samples_yield_none_not_zero() {
        let b = summarize(&[], 30);
        assert_eq!(b.avg_ctr, None);
        assert_eq!(b.avg_cpc, None);
        assert_eq!(b.avg_roas, None);
        assert_eq!(b.avg_frequency, None);
        assert_eq!(b.sample_count, 0);
    }

    #[test]
    fn absent_metric_stays_none_while_others_average() {
        let snapshots = vec![
            snapshot(1.0, 0.5, None, Some(2.0)),
            snapshot(2.0, 1.5, None, None),
        ];
        let b = summarize(&snapshots, 30);
        assert_eq!(b.avg_ctr, Some(1.5));
        assert_eq!(b.avg_cpc, Some(1.0));
        assert_eq!(b.avg_roas, None);
        // Frequency averages only over the entry that has it.
        assert_eq!(b.avg_frequency, Some(2.0));
        assert_eq!(b.sample_count, 2);
    }

    #[test]
    fn summarize_is_idempotent() {
        let snapshots = vec![
            snapshot(1.0, 0.5, Some(3.0), Some(2.0)),
            snapshot(2.0, 1.5, Some(1.0), Some(4.0)),
        ];
        assert_eq!(summarize(&snapshots, 30), summarize(&snapshots, 30));
    }
}
