use crate::domain::metrics::MetricSnapshot;
use crate::storage::StorageError;
use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

const SNAPSHOT_COLUMNS: &str = "snapshot_date, campaign_id, client_id, platform, spend, \
     impressions, clicks, ctr, cpc, roas, frequency, conversions, actions_taken";

type SnapshotRow = (
    NaiveDate,
    String,
    String,
    String,
    f64,
    i64,
    i64,
    f64,
    f64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    String,
);

/// Last-write-wins upsert for one (client, campaign, date) key, plus the
/// retention prune for that client, in a single transaction. The commit is
/// the durability point; there is no batching across snapshots.
pub async fn append_or_replace(
    pool: &SqlitePool,
    retention_days: i64,
    today: NaiveDate,
    snapshot: &MetricSnapshot,
) -> Result<(), StorageError> {
    let actions = serde_json::to_string(&snapshot.actions_taken)
        .map_err(|e| StorageError::corrupt(format!("actions_taken serialize failed: {e}")))?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO metric_snapshots \
           (client_id, campaign_id, snapshot_date, platform, spend, impressions, clicks, \
            ctr, cpc, roas, frequency, conversions, actions_taken) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (client_id, campaign_id, snapshot_date) DO UPDATE \
           SET platform = excluded.platform, spend = excluded.spend, \
               impressions = excluded.impressions, clicks = excluded.clicks, \
               ctr = excluded.ctr, cpc = excluded.cpc, roas = excluded.roas, \
               frequency = excluded.frequency, conversions = excluded.conversions, \
               actions_taken = excluded.actions_taken",
    )
    .bind(&snapshot.client_id)
    .bind(&snapshot.campaign_id)
    .bind(snapshot.date)
    .bind(&snapshot.platform)
    .bind(snapshot.spend)
    .bind(snapshot.impressions)
    .bind(snapshot.clicks)
    .bind(snapshot.ctr)
    .bind(snapshot.cpc)
    .bind(snapshot.roas)
    .bind(snapshot.frequency)
    .bind(snapshot.conversions)
    .bind(actions)
    .execute(&mut *tx)
    .await?;

    let cutoff = today - Duration::days(retention_days);
    sqlx::query("DELETE FROM metric_snapshots WHERE client_id = ? AND snapshot_date < ?")
        .bind(&snapshot.client_id)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn load_campaign(
    pool: &SqlitePool,
    client_id: &str,
    campaign_id: &str,
    days_back: i64,
    today: NaiveDate,
) -> Result<Vec<MetricSnapshot>, StorageError> {
    let cutoff = today - Duration::days(days_back);
    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM metric_snapshots \
         WHERE client_id = ? AND campaign_id = ? AND snapshot_date >= ? \
         ORDER BY snapshot_date ASC"
    ))
    .bind(client_id)
    .bind(campaign_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_into_snapshot).collect())
}

/// All campaigns of a client within the window, grouped by campaign and
/// ascending by date within each campaign.
pub async fn load_client(
    pool: &SqlitePool,
    client_id: &str,
    days_back: i64,
    today: NaiveDate,
) -> Result<BTreeMap<String, Vec<MetricSnapshot>>, StorageError> {
    let cutoff = today - Duration::days(days_back);
    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM metric_snapshots \
         WHERE client_id = ? AND snapshot_date >= ? \
         ORDER BY campaign_id ASC, snapshot_date ASC"
    ))
    .bind(client_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut out: BTreeMap<String, Vec<MetricSnapshot>> = BTreeMap::new();
    for row in rows {
        let snapshot = row_into_snapshot(row);
        out.entry(snapshot.campaign_id.clone())
            .or_default()
            .push(snapshot);
    }
    Ok(out)
}

/// Fail-open read: an unavailable store is empty history, not an error.
pub async fn load_campaign_or_empty(
    pool: &SqlitePool,
    client_id: &str,
    campaign_id: &str,
    days_back: i64,
    today: NaiveDate,
) -> Result<Vec<MetricSnapshot>, StorageError> {
    match load_campaign(pool, client_id, campaign_id, days_back, today).await {
        Ok(snapshots) => Ok(snapshots),
        Err(e) if e.is_unavailable() => {
            tracing::warn!(client_id, campaign_id, error = %e, "history unavailable; continuing empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

pub async fn load_client_or_empty(
    pool: &SqlitePool,
    client_id: &str,
    days_back: i64,
    today: NaiveDate,
) -> Result<BTreeMap<String, Vec<MetricSnapshot>>, StorageError> {
    match load_client(pool, client_id, days_back, today).await {
        Ok(history) => Ok(history),
        Err(e) if e.is_unavailable() => {
            tracing::warn!(client_id, error = %e, "history unavailable; continuing empty");
            Ok(BTreeMap::new())
        }
        Err(e) => Err(e),
    }
}

fn row_into_snapshot(row: SnapshotRow) -> MetricSnapshot {
    let (
        date,
        campaign_id,
        client_id,
        platform,
        spend,
        impressions,
        clicks,
        ctr,
        cpc,
        roas,
        frequency,
        conversions,
        actions_json,
    ) = row;

    let actions_taken = match serde_json::from_str(&actions_json) {
        Ok(actions) => actions,
        Err(e) => {
            tracing::warn!(
                %client_id,
                %campaign_id,
                %date,
                error = %e,
                "unreadable actions_taken; treating as none"
            );
            Vec::new()
        }
    };

    MetricSnapshot {
        date,
        campaign_id,
        client_id,
        platform,
        spend,
        impressions,
        clicks,
        ctr,
        cpc,
        roas,
        frequency,
        conversions,
        actions_taken,
    }
}
