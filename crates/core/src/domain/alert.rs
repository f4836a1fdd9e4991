use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

/// Spend-pace alert for one campaign. `pace_pct` is the achieved spend rate
/// as a percentage of the rate implied by elapsed time (100 == on pace).
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlert {
    pub client_id: String,
    pub campaign_id: String,
    pub platform: String,
    pub level: AlertLevel,
    pub spend: f64,
    pub pace_pct: f64,
}

impl BudgetAlert {
    /// Cooldown identity: one delivery per campaign, severity and calendar
    /// day within the cooldown window.
    pub fn cooldown_key(&self, date: NaiveDate) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.platform,
            self.client_id,
            self.campaign_id,
            date,
            self.level.as_str()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPaceStatus {
    /// Spend share within the on-track margin of elapsed time.
    OnTrack,
    /// Drifting from plan, but not badly under.
    Watch,
    /// More than the behind-margin under pace; budget will go unspent.
    UnderPacing,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPacing {
    pub projected_spend: f64,
    pub month_elapsed_pct: f64,
    pub budget_spent_pct: f64,
    pub status: MonthlyPaceStatus,
}
