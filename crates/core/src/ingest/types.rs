use crate::domain::metrics::MetricSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Campaign,
    Adset,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLevel::Campaign => "campaign",
            ReportLevel::Adset => "adset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetricsResponse {
    pub client_id: String,
    pub platform: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub items: Vec<DailyMetricsRow>,
}

/// One campaign as reported by the ad platform for the requested range.
/// Optional metrics stay absent; they are never coerced to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetricsRow {
    pub campaign_name: String,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cpc: f64,
    #[serde(default)]
    pub roas: Option<f64>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub reach: Option<f64>,
    #[serde(default)]
    pub conversions: Option<f64>,
    #[serde(default)]
    pub actions_taken: Vec<String>,
}

impl DailyMetricsRow {
    /// Stamp a single-day row into a history snapshot. `reach` is a
    /// fetch-only field and is not retained.
    pub fn into_snapshot(self, client_id: &str, platform: &str, date: NaiveDate) -> MetricSnapshot {
        MetricSnapshot {
            date,
            campaign_id: self.campaign_name,
            client_id: client_id.to_string(),
            platform: platform.to_string(),
            spend: self.spend,
            impressions: self.impressions,
            clicks: self.clicks,
            ctr: self.ctr,
            cpc: self.cpc,
            roas: self.roas,
            frequency: self.frequency,
            conversions: self.conversions,
            actions_taken: self.actions_taken,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSpendResponse {
    pub client_id: String,
    pub platform: String,
    pub items: Vec<LiveSpendRow>,
}

/// Live pacing inputs for one campaign, read mid-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSpendRow {
    pub campaign_name: String,
    pub spend_today: f64,
    pub budget_remaining: f64,
    #[serde(default)]
    pub mtd_spend: Option<f64>,
    #[serde(default)]
    pub monthly_budget: Option<f64>,
}
