use adpulse_core::config::{EngineConfig, Settings};
use adpulse_core::domain::alert::BudgetAlert;
use adpulse_core::ingest::provider::{AdDataProvider, HttpJsonAdDataProvider};
use adpulse_core::pacing::{self, AlertCooldownStore};
use anyhow::Context;
use chrono::{FixedOffset, Timelike, Utc};
use serde_json::json;
use std::time::Duration;

/// Live pacing check. With `--watch` the loop runs until killed and the
/// cooldown store keeps repeated alerts quiet between iterations; a single
/// pass is for ad-hoc runs and cron-less setups.
///
/// The monitor is deliberately storage-free: it reads live metrics straight
/// from the provider and its cooldown state is process-lifetime only.
pub async fn run(
    settings: &Settings,
    cfg: &EngineConfig,
    client: &str,
    platform: &str,
    watch: bool,
    interval_minutes: u64,
) -> anyhow::Result<()> {
    anyhow::ensure!(interval_minutes >= 1, "interval must be at least a minute");

    let provider = HttpJsonAdDataProvider::from_settings(settings)?;
    let cooldowns = AlertCooldownStore::new(cfg.pacing.cooldown_hours);

    loop {
        if let Err(err) = check_once(&provider, cfg, &cooldowns, client, platform).await {
            if !watch {
                return Err(err);
            }
            // A watch loop outlives transient provider trouble.
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(client, platform, error = %err, "pacing check failed; will retry");
        }

        if !watch {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval_minutes * 60)).await;
    }
}

async fn check_once(
    provider: &HttpJsonAdDataProvider,
    cfg: &EngineConfig,
    cooldowns: &AlertCooldownStore,
    client: &str,
    platform: &str,
) -> anyhow::Result<()> {
    let (response, _raw) = provider.fetch_live_spend(client, platform).await?;

    let now = Utc::now();
    let tz = FixedOffset::east_opt(cfg.reporting_tz_offset_hours * 3600)
        .context("invalid reporting offset")?;
    let now_local = now.with_timezone(&tz);
    let minutes_elapsed = (now_local.hour() * 60 + now_local.minute()) as f64;
    let today = now_local.date_naive();

    let mut alerts: Vec<BudgetAlert> = Vec::new();
    let mut monthly = Vec::new();

    for row in &response.items {
        if let Some(pace) = pacing::intraday_pace(row.spend_today, row.budget_remaining, minutes_elapsed)
        {
            if let Some(level) = pacing::classify_pace(pace, &cfg.pacing) {
                let alert = BudgetAlert {
                    client_id: client.to_string(),
                    campaign_id: row.campaign_name.clone(),
                    platform: platform.to_string(),
                    level,
                    spend: row.spend_today,
                    pace_pct: pace * 100.0,
                };
                if cooldowns.should_send(&alert.cooldown_key(today), now) {
                    tracing::warn!(
                        client,
                        campaign = %alert.campaign_id,
                        level = alert.level.as_str(),
                        pace_pct = alert.pace_pct,
                        "budget pace alert"
                    );
                    alerts.push(alert);
                } else {
                    tracing::debug!(
                        client,
                        campaign = %row.campaign_name,
                        "pace alert suppressed by cooldown"
                    );
                }
            }
        }

        if let (Some(mtd_spend), Some(monthly_budget)) = (row.mtd_spend, row.monthly_budget) {
            if let Some(projection) =
                pacing::monthly_pacing(mtd_spend, monthly_budget, today, &cfg.pacing)
            {
                monthly.push(json!({
                    "campaign_id": row.campaign_name,
                    "pacing": projection,
                }));
            }
        }
    }

    let output = json!({
        "client_id": client,
        "platform": platform,
        "checked_at": now,
        "alerts": alerts,
        "monthly": monthly,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
