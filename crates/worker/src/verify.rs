use adpulse_core::analytics::verify;
use adpulse_core::config::EngineConfig;
use adpulse_core::time::reporting;
use chrono::NaiveDate;
use serde_json::json;
use sqlx::SqlitePool;

/// Weekly reconciliation: settle what can be settled, then report how the
/// engine's recent predictions actually did.
pub async fn run(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    client: &str,
    date_arg: Option<&str>,
) -> anyhow::Result<()> {
    let today = match date_arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => reporting::current_date(chrono::Utc::now(), cfg.reporting_tz_offset_hours)?,
    };

    let report = verify::verify_recent(pool, cfg, client, today).await?;

    tracing::info!(
        client,
        checked = report.checked,
        newly_verified = report.newly_verified,
        accuracy_pct = report.accuracy.accuracy_pct,
        "verification pass complete"
    );

    let output = json!({ "verification": report });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
