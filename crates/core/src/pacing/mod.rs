use crate::config::PacingConfig;
use crate::domain::alert::{AlertLevel, MonthlyPaceStatus, MonthlyPacing};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

const MINUTES_PER_DAY: f64 = 1440.0;
// Floor on the elapsed-day fraction so a just-after-midnight check cannot
// blow the ratio up.
const MIN_DAY_FRACTION: f64 = 0.01;

/// Achieved spend rate relative to the rate implied by elapsed time.
/// 1.0 is exactly on pace. No reading when the day's budget is zero.
pub fn intraday_pace(spend_so_far: f64, budget_remaining: f64, minutes_elapsed: f64) -> Option<f64> {
    let total_budget = spend_so_far + budget_remaining;
    if total_budget <= 0.0 {
        return None;
    }
    let day_fraction = (minutes_elapsed / MINUTES_PER_DAY).max(MIN_DAY_FRACTION);
    Some((spend_so_far / total_budget) / day_fraction)
}

/// Severity for an intraday pace reading; strict thresholds, silent when on
/// pace.
pub fn classify_pace(pace: f64, cfg: &PacingConfig) -> Option<AlertLevel> {
    if pace > cfg.critical_ratio {
        Some(AlertLevel::Critical)
    } else if pace > cfg.warning_ratio {
        Some(AlertLevel::Warning)
    } else {
        None
    }
}

/// Straight-line month-end projection and the traffic light comparing share
/// of budget spent against share of month elapsed.
pub fn monthly_pacing(
    mtd_spend: f64,
    monthly_budget: f64,
    today: NaiveDate,
    cfg: &PacingConfig,
) -> Option<MonthlyPacing> {
    if monthly_budget <= 0.0 {
        return None;
    }

    let days_in_month = days_in_month(today)?;
    let days_elapsed = today.day() as f64;
    let days_remaining = (days_in_month - days_elapsed).max(0.0);

    let projected_spend = mtd_spend + (mtd_spend / days_elapsed) * days_remaining;
    let month_elapsed_pct = days_elapsed / days_in_month * 100.0;
    let budget_spent_pct = mtd_spend / monthly_budget * 100.0;

    let diff = budget_spent_pct - month_elapsed_pct;
    let status = if diff.abs() <= cfg.monthly_on_track_margin_pct {
        MonthlyPaceStatus::OnTrack
    } else if diff < -cfg.monthly_behind_margin_pct {
        MonthlyPaceStatus::UnderPacing
    } else {
        MonthlyPaceStatus::Watch
    };

    Some(MonthlyPacing {
        projected_spend,
        month_elapsed_pct,
        budget_spent_pct,
        status,
    })
}

fn days_in_month(date: NaiveDate) -> Option<f64> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)?
    };
    Some((next - first).num_days() as f64)
}

/// Gate against re-delivering the same alert inside the cooldown window.
/// State lives for the process only; the probe instant is passed in so tests
/// can move time instead of sleeping.
#[derive(Debug)]
pub struct AlertCooldownStore {
    cooldown: Duration,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AlertCooldownStore {
    pub fn new(cooldown_hours: i64) -> Self {
        Self {
            cooldown: Duration::hours(cooldown_hours),
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// True (and the send is recorded) iff the key has not fired within the
    /// window. A suppressed attempt does not extend the window.
    pub fn should_send(&self, alert_key: &str, now: DateTime<Utc>) -> bool {
        let mut last_sent = self
            .last_sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match last_sent.get(alert_key) {
            Some(last) if now - *last < self.cooldown => false,
            _ => {
                last_sent.insert(alert_key.to_string(), now);
                true
            }
        }
    }
}
