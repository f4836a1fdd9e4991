use crate::storage::StorageError;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Bookkeeping row for one ingest attempt, success or failure. Keeps the raw
/// provider payload around for postmortems.
pub async fn record_ingest_run(
    pool: &SqlitePool,
    client_id: &str,
    platform: &str,
    report_date: NaiveDate,
    provider: &str,
    status: &str,
    error: Option<&str>,
    raw_response: Option<&Value>,
) -> Result<Uuid, StorageError> {
    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO ingest_runs \
           (id, client_id, platform, report_date, generated_at, provider, status, error, raw_response) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(client_id)
    .bind(platform)
    .bind(report_date)
    .bind(generated_at)
    .bind(provider)
    .bind(status)
    .bind(error)
    .bind(raw_response.map(|v| v.to_string()))
    .execute(pool)
    .await?;

    Ok(id)
}
