use crate::analytics::confidence;
use crate::config::{EngineConfig, RuleThresholds};
use crate::domain::metrics::{pct_change, MetricSnapshot, CREATIVE_REFRESH_ACTION};
use crate::domain::pattern::{
    MinedPatterns, PatternObservation, PatternSummary, PatternType, WeekendSplit,
};
use crate::time::reporting::is_weekend;
use std::collections::BTreeMap;

/// Scan a client's history for the three behavioral hypotheses. Campaigns
/// with fewer than `min_snapshots_for_patterns` snapshots carry too little
/// signal and are skipped entirely.
///
/// Pure over its inputs: the same history and config always mine the same
/// patterns.
pub fn mine(history: &BTreeMap<String, Vec<MetricSnapshot>>, cfg: &EngineConfig) -> MinedPatterns {
    let thresholds = &cfg.thresholds;

    let mut refresh_obs = Vec::new();
    let mut budget_obs = Vec::new();
    let mut eligible: Vec<&MetricSnapshot> = Vec::new();

    for (campaign_id, snapshots) in history {
        if snapshots.len() < cfg.min_snapshots_for_patterns {
            continue;
        }
        refresh_obs.extend(creative_refresh_observations(
            campaign_id,
            snapshots,
            thresholds,
        ));
        budget_obs.extend(budget_increase_observations(
            campaign_id,
            snapshots,
            thresholds,
        ));
        eligible.extend(snapshots.iter());
    }

    let weekend = weekend_split(&eligible);

    let mut summaries = Vec::new();
    if !refresh_obs.is_empty() {
        summaries.push(summarize_observations(
            PatternType::CreativeRefresh,
            &refresh_obs,
        ));
    }
    if !budget_obs.is_empty() {
        summaries.push(summarize_observations(
            PatternType::BudgetIncrease,
            &budget_obs,
        ));
    }
    if let Some(split) = &weekend {
        summaries.push(weekend_summary(split, &eligible));
    }

    MinedPatterns { summaries, weekend }
}

/// Creative fatigue followed by a refresh: did CTR recover two days on?
///
/// For an adjacent pair (prev, curr): prev must show fatigue-level
/// frequency, curr must carry the refresh action, and the snapshot two steps
/// ahead of prev is the "after" reading the effect is measured against.
fn creative_refresh_observations(
    campaign_id: &str,
    snapshots: &[MetricSnapshot],
    thresholds: &RuleThresholds,
) -> Vec<PatternObservation> {
    let mut out = Vec::new();
    for (i, pair) in snapshots.windows(2).enumerate() {
        let (prev, curr) = (&pair[0], &pair[1]);
        let Some(frequency) = prev.frequency else {
            continue;
        };
        if frequency < thresholds.fatigue_frequency {
            continue;
        }
        if !curr.took_action(CREATIVE_REFRESH_ACTION) {
            continue;
        }
        let Some(after) = snapshots.get(i + 2) else {
            continue;
        };
        let Some(improvement_pct) = pct_change(prev.ctr, after.ctr) else {
            continue;
        };
        out.push(PatternObservation {
            campaign_id: campaign_id.to_string(),
            effect_pct: improvement_pct,
            success: after.ctr > prev.ctr,
        });
    }
    out
}

/// Budget jump and what it did to CPC: a spend increase past the jump
/// threshold succeeds when CPC drifted less than the acceptable amount.
fn budget_increase_observations(
    campaign_id: &str,
    snapshots: &[MetricSnapshot],
    thresholds: &RuleThresholds,
) -> Vec<PatternObservation> {
    let mut out = Vec::new();
    for pair in snapshots.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let Some(spend_delta_pct) = pct_change(prev.spend, curr.spend) else {
            continue;
        };
        if spend_delta_pct <= thresholds.budget_jump_pct {
            continue;
        }
        let Some(cpc_delta_pct) = pct_change(prev.cpc, curr.cpc) else {
            continue;
        };
        out.push(PatternObservation {
            campaign_id: campaign_id.to_string(),
            effect_pct: cpc_delta_pct,
            success: cpc_delta_pct < thresholds.acceptable_cpc_drift_pct,
        });
    }
    out
}

/// Bucket every snapshot by weekend flag and compare bucket means. Needs at
/// least one entry on each side to say anything.
fn weekend_split(snapshots: &[&MetricSnapshot]) -> Option<WeekendSplit> {
    let (weekend, weekday): (Vec<_>, Vec<_>) =
        snapshots.iter().partition(|s| is_weekend(s.date));
    if weekend.is_empty() || weekday.is_empty() {
        return None;
    }

    let weekend_avg_ctr = mean(weekend.iter().map(|s: &&MetricSnapshot| Some(s.ctr)));
    let weekday_avg_ctr = mean(weekday.iter().map(|s: &&MetricSnapshot| Some(s.ctr)));
    let weekend_avg_roas = mean(weekend.iter().map(|s| s.roas));
    let weekday_avg_roas = mean(weekday.iter().map(|s| s.roas));

    let ctr_diff_pct = match (weekday_avg_ctr, weekend_avg_ctr) {
        (Some(wd), Some(we)) => pct_change(wd, we),
        _ => None,
    };
    let roas_diff_pct = match (weekday_avg_roas, weekend_avg_roas) {
        (Some(wd), Some(we)) => pct_change(wd, we),
        _ => None,
    };

    Some(WeekendSplit {
        weekend_avg_ctr,
        weekday_avg_ctr,
        weekend_avg_roas,
        weekday_avg_roas,
        ctr_diff_pct,
        roas_diff_pct,
        weekend_samples: weekend.len(),
        weekday_samples: weekday.len(),
    })
}

fn summarize_observations(
    pattern_type: PatternType,
    observations: &[PatternObservation],
) -> PatternSummary {
    let successes = observations.iter().filter(|o| o.success).count();
    let avg_effect_pct =
        observations.iter().map(|o| o.effect_pct).sum::<f64>() / observations.len() as f64;
    PatternSummary {
        pattern_type,
        total_observations: observations.len(),
        successes,
        avg_effect_pct,
        confidence: confidence::score(observations.len(), successes),
    }
}

/// The weekend hypothesis counts every bucketed snapshot as an observation;
/// a weekend snapshot beating the weekday mean CTR counts as a success.
fn weekend_summary(split: &WeekendSplit, snapshots: &[&MetricSnapshot]) -> PatternSummary {
    let total = split.weekend_samples + split.weekday_samples;
    let successes = match split.weekday_avg_ctr {
        Some(weekday_mean) => snapshots
            .iter()
            .filter(|s| is_weekend(s.date) && s.ctr > weekday_mean)
            .count(),
        None => 0,
    };
    PatternSummary {
        pattern_type: PatternType::WeekendVsWeekday,
        total_observations: total,
        successes,
        avg_effect_pct: split.ctr_diff_pct.unwrap_or(0.0),
        confidence: confidence::score(total, successes),
    }
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
    use chrono::NaiveDate;

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

    fn history_of(snapshots: Vec<MetricSnapshot>) -> BTreeMap<String, Vec<MetricSnapshot>> {
        let mut out = BTreeMap::new();
        out.insert("spring_sale".to_string(), snapshots);
        out
    }

    #[test]
    fn refresh_after_fatigue_measures_ctr_two_steps_ahead() {
        // Mon 5th: fatigued at freq 5.0; Tue 6th: refresh shipped; Wed 7th:
        // CTR recovered past the fatigued baseline.
        let mut fatigued = snapshot(day(5), 1.0);
        fatigued.frequency = Some(5.0);
        let mut refreshed = snapshot(day(6), 0.9);
        refreshed.actions_taken = vec![CREATIVE_REFRESH_ACTION.to_string()];
        let after = snapshot(day(7), 1.2);

        let cfg = EngineConfig::default();
        let mined = mine(&history_of(vec![fatigued, refreshed, after]), &cfg);
        let summary = mined.summary(PatternType::CreativeRefresh).unwrap();
        assert_eq!(summary.total_observations, 1);
        assert_eq!(summary.successes, 1);
        assert!((summary.avg_effect_pct - 20.0).abs() < 1e-9);
        // One observation is below the scorer's evidence minimum.
        assert_eq!(summary.confidence, 0.0);
    }

    #[test]
    fn refresh_without_after_snapshot_is_not_an_observation() {
        let mut fatigued = snapshot(day(5), 1.0);
        fatigued.frequency = Some(5.0);
        let mut refreshed = snapshot(day(6), 0.9);
        refreshed.actions_taken = vec![CREATIVE_REFRESH_ACTION.to_string()];
        let filler = snapshot(day(4), 1.1);

        let cfg = EngineConfig::default();
        let mined = mine(&history_of(vec![filler, fatigued, refreshed]), &cfg);
        assert!(mined.summary(PatternType::CreativeRefresh).is_none());
    }

    #[test]
    fn budget_jump_with_cpc_spike_is_a_failed_observation() {
        // Spend 100 -> 130 (+30%) fires the hypothesis; CPC 2.0 -> 2.5
        // (+25%) is past the acceptable 10% drift, so it failed.
        let mut before = snapshot(day(5), 1.0);
        before.spend = 100.0;
        before.cpc = 2.0;
        let mut jumped = snapshot(day(6), 1.0);
        jumped.spend = 130.0;
        jumped.cpc = 2.5;
        let mut steady = snapshot(day(7), 1.0);
        steady.spend = 130.0;
        steady.cpc = 2.5;

        let cfg = EngineConfig::default();
        let mined = mine(&history_of(vec![before, jumped, steady]), &cfg);
        let summary = mined.summary(PatternType::BudgetIncrease).unwrap();
        assert_eq!(summary.total_observations, 1);
        assert_eq!(summary.successes, 0);
        assert!((summary.avg_effect_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn weekend_split_compares_bucket_means() {
        // 2026-01-03 is Saturday; 5th and 6th are weekdays.
        let history = history_of(vec![
            snapshot(day(3), 2.4),
            snapshot(day(5), 1.8),
            snapshot(day(6), 1.8),
        ]);
        let cfg = EngineConfig::default();
        let mined = mine(&history, &cfg);
        let split = mined.weekend.unwrap();
        assert_eq!(split.weekend_samples, 1);
        assert_eq!(split.weekday_samples, 2);
        let diff = split.ctr_diff_pct.unwrap();
        assert!((diff - 33.333333333333336).abs() < 1e-6);
        assert_eq!(split.roas_diff_pct, None);
    }

    #[test]
    fn weekend_split_requires_both_buckets() {
        let history = history_of(vec![
            snapshot(day(5), 1.8),
            snapshot(day(6), 1.9),
            snapshot(day(7), 2.0),
        ]);
        let cfg = EngineConfig::default();
        let mined = mine(&history, &cfg);
        assert!(mined.weekend.is_none());
        assert!(mined.summary(PatternType::WeekendVsWeekday).is_none());
    }

    #[test]
    fn thin_campaigns_are_skipped() {
        let mut fatigued = snapshot(day(5), 1.0);
        fatigued.frequency = Some(6.0);
        let mut refreshed = snapshot(day(6), 0.9);
        refreshed.actions_taken = vec![CREATIVE_REFRESH_ACTION.to_string()];

        let cfg = EngineConfig::default();
        // Two snapshots is below the three-snapshot minimum.
        let mined = mine(&history_of(vec![fatigued, refreshed]), &cfg);
        assert!(mined.summaries.is_empty());
        assert!(mined.weekend.is_none());
    }

    #[test]
    fn mining_is_idempotent() {
        let history = history_of(vec![
            snapshot(day(3), 2.4),
            snapshot(day(5), 1.8),
            snapshot(day(6), 1.8),
        ]);
        let cfg = EngineConfig::default();
        let a = mine(&history, &cfg);
        let b = mine(&history, &cfg);
        assert_eq!(a.summaries.len(), b.summaries.len());
        assert_eq!(
            a.weekend.as_ref().map(|w| w.ctr_diff_pct),
            b.weekend.as_ref().map(|w| w.ctr_diff_pct)
        );
    }
}
