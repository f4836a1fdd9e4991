use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Action tag recorded on a snapshot when creative was swapped that day.
pub const CREATIVE_REFRESH_ACTION: &str = "creative_refresh";

/// One day's realized metrics for one campaign.
///
/// CTR is stored in percentage points (1.0 == 1%), CPC in account currency
/// units, ROAS as a plain revenue/spend ratio. Metrics a platform does not
/// report stay `None`; they are never coerced to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub date: NaiveDate,
    pub campaign_id: String,
    pub client_id: String,
    pub platform: String,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cpc: f64,
    pub roas: Option<f64>,
    pub frequency: Option<f64>,
    pub conversions: Option<f64>,
    pub actions_taken: Vec<String>,
}

impl MetricSnapshot {
    pub fn took_action(&self, action: &str) -> bool {
        self.actions_taken.iter().any(|a| a == action)
    }
}

/// Which metric a recommendation or prediction talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Ctr,
    Cpc,
    Roas,
    Frequency,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Ctr => "ctr",
            MetricKind::Cpc => "cpc",
            MetricKind::Roas => "roas",
            MetricKind::Frequency => "frequency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ctr" => Some(MetricKind::Ctr),
            "cpc" => Some(MetricKind::Cpc),
            "roas" => Some(MetricKind::Roas),
            "frequency" => Some(MetricKind::Frequency),
            _ => None,
        }
    }

    /// Value of this metric in a snapshot, if the platform reported it.
    pub fn value_in(&self, snapshot: &MetricSnapshot) -> Option<f64> {
        match self {
            MetricKind::Ctr => Some(snapshot.ctr),
            MetricKind::Cpc => Some(snapshot.cpc),
            MetricKind::Roas => snapshot.roas,
            MetricKind::Frequency => snapshot.frequency,
        }
    }
}

/// Rolling averages over a lookback window. A metric with zero qualifying
/// samples is `None`, never `0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmark {
    pub avg_ctr: Option<f64>,
    pub avg_cpc: Option<f64>,
    pub avg_roas: Option<f64>,
    pub avg_frequency: Option<f64>,
    pub period_days: i64,
    pub sample_count: usize,
}

/// Signed percentage change, skipped on a zero base.
pub fn pct_change(prev: f64, curr: f64) -> Option<f64> {
    if prev == 0.0 {
        None
    } else {
        Some((curr - prev) / prev * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_skips_zero_base() {
        assert_eq!(pct_change(0.0, 5.0), None);
        assert_eq!(pct_change(100.0, 130.0), Some(30.0));
        assert_eq!(pct_change(2.0, 1.0), Some(-50.0));
    }

    #[test]
    fn metric_kind_round_trips_through_str() {
        for kind in [
            MetricKind::Ctr,
            MetricKind::Cpc,
            MetricKind::Roas,
            MetricKind::Frequency,
        ] {
            assert_eq!(MetricKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MetricKind::parse("spend"), None);
    }
}
