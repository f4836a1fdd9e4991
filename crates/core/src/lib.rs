pub mod analytics;
pub mod domain;
pub mod ingest;
pub mod pacing;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub ad_data_base_url: Option<String>,
        pub ad_data_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                ad_data_base_url: std::env::var("AD_DATA_BASE_URL").ok(),
                ad_data_api_key: std::env::var("AD_DATA_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_ad_data_base_url(&self) -> anyhow::Result<&str> {
            self.ad_data_base_url
                .as_deref()
                .context("AD_DATA_BASE_URL is required")
        }
    }

    /// Every heuristic the engine applies, as overridable parameters.
    /// Defaults are the tuned production values; none of them is baked into
    /// the rule code itself.
    #[derive(Debug, Clone)]
    pub struct EngineConfig {
        pub retention_days: i64,
        pub benchmark_lookback_days: i64,
        pub pattern_lookback_days: i64,
        pub min_snapshots_for_patterns: usize,
        pub confidence_floor: f64,
        pub reporting_tz_offset_hours: i32,
        pub thresholds: RuleThresholds,
        pub pacing: PacingConfig,
        pub verification: VerificationConfig,
    }

    #[derive(Debug, Clone)]
    pub struct RuleThresholds {
        /// Ad frequency at which creative fatigue sets in.
        pub fatigue_frequency: f64,
        /// Ad frequency at which the refresh recommendation turns critical.
        pub critical_frequency: f64,
        pub refresh_confidence_boost: f64,
        pub refresh_frequency_slope: f64,
        pub refresh_confidence_cap: f64,
        /// Fallback CTR lift for a refresh when no pattern history exists.
        pub refresh_default_ctr_lift_pct: f64,
        /// CTR (percentage points) below which targeting looks broken.
        pub low_ctr_pct: f64,
        pub targeting_confidence: f64,
        pub targeting_ctr_lift_pct: f64,
        pub low_roas: f64,
        /// Daily spend above which a weak ROAS is worth acting on.
        pub low_roas_min_spend: f64,
        pub pause_confidence: f64,
        pub pause_roas_lift_pct: f64,
        /// CPC (currency units) above which the bid strategy is suspect.
        pub high_cpc: f64,
        pub bidding_confidence: f64,
        pub bidding_cpc_drop_pct: f64,
        /// Spend jump (pct) that counts as a deliberate budget increase.
        pub budget_jump_pct: f64,
        /// CPC drift (pct) still considered a healthy budget increase.
        pub acceptable_cpc_drift_pct: f64,
        /// Weekend-over-weekday ROAS uplift (pct) that justifies dayparting.
        pub weekend_uplift_pct: f64,
        pub daypart_confidence_base: f64,
        pub daypart_confidence_cap: f64,
    }

    #[derive(Debug, Clone)]
    pub struct PacingConfig {
        pub warning_ratio: f64,
        pub critical_ratio: f64,
        pub cooldown_hours: i64,
        pub monthly_on_track_margin_pct: f64,
        pub monthly_behind_margin_pct: f64,
    }

    #[derive(Debug, Clone)]
    pub struct VerificationConfig {
        /// How far back to look for unverified predictions.
        pub window_days: i64,
        /// Days the market gets to react before the "after" snapshot counts.
        pub settle_days: i64,
    }

    impl Default for EngineConfig {
        fn default() -> Self {
            Self {
                retention_days: 90,
                benchmark_lookback_days: 30,
                pattern_lookback_days: 90,
                min_snapshots_for_patterns: 3,
                confidence_floor: 0.50,
                reporting_tz_offset_hours: 0,
                thresholds: RuleThresholds::default(),
                pacing: PacingConfig::default(),
                verification: VerificationConfig::default(),
            }
        }
    }

    impl Default for RuleThresholds {
        fn default() -> Self {
            Self {
                fatigue_frequency: 4.5,
                critical_frequency: 6.0,
                refresh_confidence_boost: 0.30,
                refresh_frequency_slope: 0.05,
                refresh_confidence_cap: 0.95,
                refresh_default_ctr_lift_pct: 15.0,
                low_ctr_pct: 0.6,
                targeting_confidence: 0.72,
                targeting_ctr_lift_pct: 20.0,
                low_roas: 1.5,
                low_roas_min_spend: 50.0,
                pause_confidence: 0.80,
                pause_roas_lift_pct: 25.0,
                high_cpc: 15.0,
                bidding_confidence: 0.65,
                bidding_cpc_drop_pct: -15.0,
                budget_jump_pct: 20.0,
                acceptable_cpc_drift_pct: 10.0,
                weekend_uplift_pct: 10.0,
                daypart_confidence_base: 0.50,
                daypart_confidence_cap: 0.85,
            }
        }
    }

    impl Default for PacingConfig {
        fn default() -> Self {
            Self {
                warning_ratio: 1.2,
                critical_ratio: 1.5,
                cooldown_hours: 4,
                monthly_on_track_margin_pct: 10.0,
                monthly_behind_margin_pct: 15.0,
            }
        }
    }

    impl Default for VerificationConfig {
        fn default() -> Self {
            Self {
                window_days: 7,
                settle_days: 2,
            }
        }
    }

    impl EngineConfig {
        pub fn from_env() -> Self {
            let mut out = Self::default();

            override_i64(&mut out.retention_days, "RETENTION_DAYS");
            override_i64(&mut out.benchmark_lookback_days, "BENCHMARK_LOOKBACK_DAYS");
            override_i64(&mut out.pattern_lookback_days, "PATTERN_LOOKBACK_DAYS");
            override_usize(&mut out.min_snapshots_for_patterns, "PATTERN_MIN_SNAPSHOTS");
            override_f64(&mut out.confidence_floor, "CONFIDENCE_FLOOR");
            override_i32(&mut out.reporting_tz_offset_hours, "REPORTING_TZ_OFFSET_HOURS");

            override_f64(&mut out.thresholds.fatigue_frequency, "FATIGUE_FREQUENCY");
            override_f64(&mut out.thresholds.critical_frequency, "CRITICAL_FREQUENCY");
            override_f64(&mut out.thresholds.low_ctr_pct, "LOW_CTR_PCT");
            override_f64(&mut out.thresholds.low_roas, "LOW_ROAS");
            override_f64(&mut out.thresholds.low_roas_min_spend, "LOW_ROAS_MIN_SPEND");
            override_f64(&mut out.thresholds.high_cpc, "HIGH_CPC");
            override_f64(&mut out.thresholds.budget_jump_pct, "BUDGET_JUMP_PCT");
            override_f64(
                &mut out.thresholds.acceptable_cpc_drift_pct,
                "ACCEPTABLE_CPC_DRIFT_PCT",
            );
            override_f64(&mut out.thresholds.weekend_uplift_pct, "WEEKEND_UPLIFT_PCT");

            override_f64(&mut out.pacing.warning_ratio, "PACING_WARNING_RATIO");
            override_f64(&mut out.pacing.critical_ratio, "PACING_CRITICAL_RATIO");
            override_i64(&mut out.pacing.cooldown_hours, "ALERT_COOLDOWN_HOURS");
            override_f64(
                &mut out.pacing.monthly_on_track_margin_pct,
                "MONTHLY_ON_TRACK_MARGIN_PCT",
            );
            override_f64(
                &mut out.pacing.monthly_behind_margin_pct,
                "MONTHLY_BEHIND_MARGIN_PCT",
            );

            override_i64(&mut out.verification.window_days, "VERIFY_WINDOW_DAYS");
            override_i64(&mut out.verification.settle_days, "VERIFY_SETTLE_DAYS");

            out
        }
    }

    fn override_f64(slot: &mut f64, key: &str) {
        if let Ok(s) = std::env::var(key) {
            if let Ok(n) = s.parse::<f64>() {
                *slot = n;
            }
        }
    }

    fn override_i64(slot: &mut i64, key: &str) {
        if let Ok(s) = std::env::var(key) {
            if let Ok(n) = s.parse::<i64>() {
                *slot = n;
            }
        }
    }

    fn override_i32(slot: &mut i32, key: &str) {
        if let Ok(s) = std::env::var(key) {
            if let Ok(n) = s.parse::<i32>() {
                *slot = n;
            }
        }
    }

    fn override_usize(slot: &mut usize, key: &str) {
        if let Ok(s) = std::env::var(key) {
            if let Ok(n) = s.parse::<usize>() {
                *slot = n;
            }
        }
    }
}
