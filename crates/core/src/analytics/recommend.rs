use crate::analytics::patterns;
use crate::config::EngineConfig;
use crate::domain::metrics::{MetricKind, MetricSnapshot};
use crate::domain::pattern::{MinedPatterns, PatternType, WeekendSplit};
use crate::domain::recommendation::{
    confidence_label, Recommendation, RecommendedAction, Urgency,
};
use crate::storage::{self, StorageError};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::cmp::Ordering;

/// Campaign id used for portfolio-level recommendations. A prediction
/// promoted under this scope has no snapshots to reconcile against and stays
/// unverified, which is a valid terminal state.
pub const PORTFOLIO_SCOPE: &str = "portfolio";

/// Candidate rules for one campaign, evaluated on its latest snapshot.
/// Rules are independent and non-exclusive; each fires at most once. The
/// confidence floor is applied later, in `filter_and_rank`.
pub fn candidate_rules(
    latest: &MetricSnapshot,
    mined: &MinedPatterns,
    cfg: &EngineConfig,
) -> Vec<Recommendation> {
    let t = &cfg.thresholds;
    let mut out = Vec::new();

    if let Some(frequency) = latest.frequency {
        if frequency >= t.fatigue_frequency {
            let refresh_pattern = mined.summary(PatternType::CreativeRefresh);
            let pattern_confidence = refresh_pattern.map(|p| p.confidence).unwrap_or(0.0);
            let confidence = (pattern_confidence
                + t.refresh_confidence_boost
                + (frequency - t.fatigue_frequency) * t.refresh_frequency_slope)
                .min(t.refresh_confidence_cap);
            let urgency = if frequency >= t.critical_frequency {
                Urgency::Critical
            } else {
                Urgency::Warning
            };
            let predicted_change_pct = refresh_pattern
                .map(|p| p.avg_effect_pct)
                .unwrap_or(t.refresh_default_ctr_lift_pct);
            let evidence = match refresh_pattern {
                Some(p) => format!(
                    "{} of {} past refreshes lifted CTR",
                    p.successes, p.total_observations
                ),
                None => "no refresh history for this account yet".to_string(),
            };
            out.push(build(
                latest.campaign_id.clone(),
                RecommendedAction::RefreshCreative,
                format!(
                    "ad frequency {frequency:.1} is past the fatigue threshold {:.1}",
                    t.fatigue_frequency
                ),
                evidence,
                format!("CTR {predicted_change_pct:+.1}% after a creative swap"),
                confidence,
                urgency,
                MetricKind::Ctr,
                predicted_change_pct,
            ));
        }
    }

    if latest.ctr < t.low_ctr_pct {
        out.push(build(
            latest.campaign_id.clone(),
            RecommendedAction::AdjustTargeting,
            format!(
                "CTR {:.2}% is below the {:.2}% floor",
                latest.ctr, t.low_ctr_pct
            ),
            format!("{} impressions produced {} clicks", latest.impressions, latest.clicks),
            format!("CTR {:+.1}% with tighter audiences", t.targeting_ctr_lift_pct),
            t.targeting_confidence,
            Urgency::Warning,
            MetricKind::Ctr,
            t.targeting_ctr_lift_pct,
        ));
    }

    if let Some(roas) = latest.roas {
        if roas < t.low_roas && latest.spend > t.low_roas_min_spend {
            out.push(build(
                latest.campaign_id.clone(),
                RecommendedAction::PauseOrOptimize,
                format!(
                    "ROAS {roas:.2} is below {:.2} at {:.0} daily spend",
                    t.low_roas, latest.spend
                ),
                format!("spend {:.2} returning {roas:.2}x", latest.spend),
                format!("ROAS {:+.1}% after restructuring or pausing", t.pause_roas_lift_pct),
                t.pause_confidence,
                Urgency::Critical,
                MetricKind::Roas,
                t.pause_roas_lift_pct,
            ));
        }
    }

    if latest.cpc > t.high_cpc {
        out.push(build(
            latest.campaign_id.clone(),
            RecommendedAction::SwitchBidStrategy,
            format!("CPC {:.2} is above the {:.2} ceiling", latest.cpc, t.high_cpc),
            format!("{} clicks cost {:.2}", latest.clicks, latest.spend),
            format!("CPC {:+.1}% under a different bid strategy", t.bidding_cpc_drop_pct),
            t.bidding_confidence,
            Urgency::Warning,
            MetricKind::Cpc,
            t.bidding_cpc_drop_pct,
        ));
    }

    out
}

/// Portfolio-level rule: a weekend ROAS uplift past the threshold argues for
/// shifting budget toward weekends.
pub fn portfolio_rules(weekend: Option<&WeekendSplit>, cfg: &EngineConfig) -> Vec<Recommendation> {
    let t = &cfg.thresholds;
    let Some(split) = weekend else {
        return Vec::new();
    };
    let Some(diff) = split.roas_diff_pct else {
        return Vec::new();
    };
    if diff <= t.weekend_uplift_pct {
        return Vec::new();
    }

    let confidence = (t.daypart_confidence_base + diff.abs() / 100.0).min(t.daypart_confidence_cap);
    vec![build(
        PORTFOLIO_SCOPE.to_string(),
        RecommendedAction::ShiftBudgetToWeekend,
        format!("weekend ROAS runs {diff:+.1}% versus weekdays"),
        format!(
            "{} weekend vs {} weekday snapshots",
            split.weekend_samples, split.weekday_samples
        ),
        format!("ROAS {diff:+.1}% on budget moved to weekends"),
        confidence,
        Urgency::Info,
        MetricKind::Roas,
        diff,
    )]
}

/// Suppress everything under the floor (no "unlabeled" output), then rank by
/// confidence descending with a stable campaign tiebreak.
pub fn filter_and_rank(mut recommendations: Vec<Recommendation>, floor: f64) -> Vec<Recommendation> {
    recommendations.retain(|r| r.confidence >= floor);
    recommendations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });
    recommendations
}

/// Full pipeline for one client: load the pattern window, mine it, evaluate
/// every campaign's latest snapshot plus the portfolio rule, filter, rank.
pub async fn recommend_for_client(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    client_id: &str,
    platform: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<Recommendation>, StorageError> {
    let mut history =
        storage::history::load_client_or_empty(pool, client_id, cfg.pattern_lookback_days, today)
            .await?;

    if let Some(platform) = platform {
        for snapshots in history.values_mut() {
            snapshots.retain(|s| s.platform == platform);
        }
        history.retain(|_, snapshots| !snapshots.is_empty());
    }

    let mined = patterns::mine(&history, cfg);

    let mut candidates = Vec::new();
    for snapshots in history.values() {
        if let Some(latest) = snapshots.last() {
            candidates.extend(candidate_rules(latest, &mined, cfg));
        }
    }
    candidates.extend(portfolio_rules(mined.weekend.as_ref(), cfg));

    Ok(filter_and_rank(candidates, cfg.confidence_floor))
}

#[allow(clippy::too_many_arguments)]
fn build(
    campaign_id: String,
    action: RecommendedAction,
    reason: String,
    evidence: String,
    expected_impact: String,
    confidence: f64,
    urgency: Urgency,
    predicted_metric: MetricKind,
    predicted_change_pct: f64,
) -> Recommendation {
    Recommendation {
        campaign_id,
        action,
        reason,
        evidence,
        expected_impact,
        confidence,
        urgency,
        label: confidence_label(confidence),
        predicted_metric,
        predicted_change_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::PatternSummary;

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
            campaign_id: "spring_sale".to_string(),
            client_id: "acme".to_string(),
            platform: "meta".to_string(),
            spend: 40.0,
            impressions: 5_000,
            clicks: 60,
            ctr: 1.2,
            cpc: 0.8,
            roas: None,
            frequency: None,
            conversions: None,
            actions_taken: Vec::new(),
        }
    }

    fn no_patterns() -> MinedPatterns {
        MinedPatterns::default()
    }

    #[test]
    fn fresh_account_fatigue_confidence_is_boost_plus_slope() {
        // Frequency 5.2 with zero pattern history: 0 + 0.30 + 0.7 * 0.05.
        let mut latest = snapshot();
        latest.frequency = Some(5.2);

        let cfg = EngineConfig::default();
        let candidates = candidate_rules(&latest, &no_patterns(), &cfg);
        assert_eq!(candidates.len(), 1);
        let rec = &candidates[0];
        assert_eq!(rec.action, RecommendedAction::RefreshCreative);
        assert!((rec.confidence - 0.335).abs() < 1e-9);
        assert_eq!(rec.urgency, Urgency::Warning);

        // Below the floor it is suppressed entirely, never shown unlabeled.
        assert!(filter_and_rank(candidates, cfg.confidence_floor).is_empty());
    }

    #[test]
    fn extreme_frequency_turns_critical_and_caps() {
        let mut latest = snapshot();
        latest.frequency = Some(20.0);

        let mut mined = no_patterns();
        mined.summaries.push(PatternSummary {
            pattern_type: PatternType::CreativeRefresh,
            total_observations: 6,
            successes: 6,
            avg_effect_pct: 18.0,
            confidence: 1.0,
        });

        let cfg = EngineConfig::default();
        let candidates = candidate_rules(&latest, &mined, &cfg);
        let rec = &candidates[0];
        assert_eq!(rec.urgency, Urgency::Critical);
        assert_eq!(rec.confidence, cfg.thresholds.refresh_confidence_cap);
        // Mined effect wins over the default lift.
        assert_eq!(rec.predicted_change_pct, 18.0);
    }

    #[test]
    fn low_ctr_low_roas_and_high_cpc_rules_fire_independently() {
        let mut latest = snapshot();
        latest.ctr = 0.4;
        latest.roas = Some(1.1);
        latest.spend = 80.0;
        latest.cpc = 18.0;

        let cfg = EngineConfig::default();
        let candidates = candidate_rules(&latest, &no_patterns(), &cfg);
        let actions: Vec<_> = candidates.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![
                RecommendedAction::AdjustTargeting,
                RecommendedAction::PauseOrOptimize,
                RecommendedAction::SwitchBidStrategy,
            ]
        );

        let ranked = filter_and_rank(candidates, cfg.confidence_floor);
        assert_eq!(ranked[0].action, RecommendedAction::PauseOrOptimize);
        assert_eq!(ranked[0].confidence, 0.80);
        assert_eq!(ranked[0].label, "recommend");
        assert_eq!(ranked[2].action, RecommendedAction::SwitchBidStrategy);
        assert_eq!(ranked[2].label, "consider");
    }

    #[test]
    fn missing_roas_keeps_the_pause_rule_quiet() {
        let mut latest = snapshot();
        latest.roas = None;
        latest.spend = 500.0;

        let cfg = EngineConfig::default();
        let candidates = candidate_rules(&latest, &no_patterns(), &cfg);
        assert!(candidates
            .iter()
            .all(|r| r.action != RecommendedAction::PauseOrOptimize));
    }

    #[test]
    fn weekend_uplift_drives_the_dayparting_rule() {
        let split = WeekendSplit {
            weekend_avg_ctr: Some(2.0),
            weekday_avg_ctr: Some(1.9),
            weekend_avg_roas: Some(3.0),
            weekday_avg_roas: Some(2.4),
            ctr_diff_pct: Some(5.3),
            roas_diff_pct: Some(25.0),
            weekend_samples: 4,
            weekday_samples: 10,
        };

        let cfg = EngineConfig::default();
        let recs = portfolio_rules(Some(&split), &cfg);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].action, RecommendedAction::ShiftBudgetToWeekend);
        assert!((recs[0].confidence - 0.75).abs() < 1e-9);
        assert_eq!(recs[0].campaign_id, PORTFOLIO_SCOPE);

        // Uplift at or under the threshold stays silent.
        let mut flat = split;
        flat.roas_diff_pct = Some(10.0);
        assert!(portfolio_rules(Some(&flat), &cfg).is_empty());
    }

    #[test]
    fn output_never_contains_sub_floor_confidence() {
        let mut latest = snapshot();
        latest.frequency = Some(4.6);
        latest.ctr = 0.4;
        latest.cpc = 16.0;

        let cfg = EngineConfig::default();
        let ranked = filter_and_rank(candidate_rules(&latest, &no_patterns(), &cfg), cfg.confidence_floor);
        assert!(!ranked.is_empty());
        assert!(ranked.iter().all(|r| r.confidence >= cfg.confidence_floor));
        // And the ranking is descending.
        for pair in ranked.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
