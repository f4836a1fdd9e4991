use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    CreativeRefresh,
    BudgetIncrease,
    WeekendVsWeekday,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::CreativeRefresh => "creative_refresh",
            PatternType::BudgetIncrease => "budget_increase",
            PatternType::WeekendVsWeekday => "weekend_vs_weekday",
        }
    }
}

/// One historical transition backing a hypothesis. Recomputed on every mining
/// run, never persisted.
#[derive(Debug, Clone)]
pub struct PatternObservation {
    pub campaign_id: String,
    pub effect_pct: f64,
    pub success: bool,
}

/// Aggregate view of one hypothesis over the mined window. Derived data;
/// identical history always yields an identical summary.
#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub pattern_type: PatternType,
    pub total_observations: usize,
    pub successes: usize,
    pub avg_effect_pct: f64,
    pub confidence: f64,
}

/// Weekend/weekday bucket comparison. Deltas are signed percentages of the
/// weekday mean; a delta is absent when either bucket lacks the metric.
#[derive(Debug, Clone, Serialize)]
pub struct WeekendSplit {
    pub weekend_avg_ctr: Option<f64>,
    pub weekday_avg_ctr: Option<f64>,
    pub weekend_avg_roas: Option<f64>,
    pub weekday_avg_roas: Option<f64>,
    pub ctr_diff_pct: Option<f64>,
    pub roas_diff_pct: Option<f64>,
    pub weekend_samples: usize,
    pub weekday_samples: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MinedPatterns {
    pub summaries: Vec<PatternSummary>,
    pub weekend: Option<WeekendSplit>,
}

impl MinedPatterns {
    pub fn summary(&self, kind: PatternType) -> Option<&PatternSummary> {
        self.summaries.iter().find(|s| s.pattern_type == kind)
    }
}
