use adpulse_core::analytics::{benchmark, recommend};
use adpulse_core::config::{EngineConfig, Settings};
use adpulse_core::ingest::provider::{AdDataProvider, HttpJsonAdDataProvider};
use adpulse_core::ingest::types::ReportLevel;
use adpulse_core::storage;
use adpulse_core::time::reporting;
use chrono::NaiveDate;
use serde_json::json;
use sqlx::SqlitePool;

/// Daily digest: fetch the settled day, persist the snapshots, re-mine the
/// history, emit recommendations and freeze them as predictions. Output goes
/// to stdout as JSON for the messaging layer to format.
pub async fn run(
    pool: &SqlitePool,
    settings: &Settings,
    cfg: &EngineConfig,
    client: &str,
    platform: &str,
    date_arg: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let report_date =
        reporting::resolve_report_date(date_arg, chrono::Utc::now(), cfg.reporting_tz_offset_hours)?;

    let provider = HttpJsonAdDataProvider::from_settings(settings)?;
    let fetched = provider
        .fetch_daily_metrics(client, platform, report_date, report_date, ReportLevel::Campaign)
        .await;

    let (response, raw) = match fetched {
        Ok(ok) => ok,
        Err(err) => {
            // Best effort: the failed attempt is still worth a bookkeeping row.
            let _ = storage::runs::record_ingest_run(
                pool,
                client,
                platform,
                report_date,
                provider.provider_name(),
                "error",
                Some(&format!("{err:#}")),
                None,
            )
            .await;
            return Err(err);
        }
    };

    if dry_run {
        tracing::info!(
            client,
            platform,
            %report_date,
            dry_run = true,
            campaigns = response.items.len(),
            "digest dry-run; nothing written"
        );
        return Ok(());
    }

    let acquired = storage::lock::try_acquire_digest_lock(pool, client, report_date).await?;
    if !acquired {
        tracing::warn!(client, %report_date, "digest lock not acquired; another run in progress");
        return Ok(());
    }

    let result = run_locked(
        pool,
        cfg,
        client,
        platform,
        report_date,
        provider.provider_name(),
        response,
        raw,
    )
    .await;
    let _ = storage::lock::release_digest_lock(pool, client, report_date).await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn run_locked(
    pool: &SqlitePool,
    cfg: &EngineConfig,
    client: &str,
    platform: &str,
    report_date: NaiveDate,
    provider_name: &str,
    response: adpulse_core::ingest::types::DailyMetricsResponse,
    raw: serde_json::Value,
) -> anyhow::Result<()> {
    let mut snapshots_stored = 0usize;
    for row in response.items {
        let snapshot = row.into_snapshot(client, platform, report_date);
        storage::history::append_or_replace(pool, cfg.retention_days, report_date, &snapshot)
            .await?;
        snapshots_stored += 1;
    }

    storage::runs::record_ingest_run(
        pool,
        client,
        platform,
        report_date,
        provider_name,
        "success",
        None,
        Some(&raw),
    )
    .await?;

    let recommendations =
        recommend::recommend_for_client(pool, cfg, client, Some(platform), report_date).await?;
    let predictions =
        storage::predictions::record_promotions(pool, cfg.retention_days, report_date, client, &recommendations)
            .await?;
    let benchmark =
        benchmark::compute(pool, cfg, client, platform, None, report_date).await?;

    tracing::info!(
        client,
        platform,
        %report_date,
        snapshots_stored,
        recommendations = recommendations.len(),
        predictions_recorded = predictions.len(),
        "digest complete"
    );

    let output = json!({
        "client_id": client,
        "platform": platform,
        "report_date": report_date,
        "snapshots_stored": snapshots_stored,
        "benchmark": benchmark,
        "recommendations": recommendations,
        "predictions_recorded": predictions.len(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
