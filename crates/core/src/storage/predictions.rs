use crate::domain::metrics::MetricKind;
use crate::domain::prediction::Prediction;
use crate::domain::recommendation::{Recommendation, RecommendedAction};
use crate::storage::StorageError;
use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;
use uuid::Uuid;

const PREDICTION_COLUMNS: &str = "id, client_id, campaign_id, issued_on, action, \
     predicted_metric, predicted_change_pct, confidence, actual_change_pct, verified";

type PredictionRow = (
    String,
    String,
    String,
    NaiveDate,
    String,
    String,
    f64,
    f64,
    Option<f64>,
    bool,
);

/// Freeze surfaced recommendations as predictions, in one transaction, and
/// prune the client's predictions past retention.
pub async fn record_promotions(
    pool: &SqlitePool,
    retention_days: i64,
    issued_on: NaiveDate,
    client_id: &str,
    recommendations: &[Recommendation],
) -> Result<Vec<Prediction>, StorageError> {
    let mut tx = pool.begin().await?;
    let mut out = Vec::with_capacity(recommendations.len());

    for rec in recommendations {
        let prediction = Prediction {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            campaign_id: rec.campaign_id.clone(),
            issued_on,
            action: rec.action,
            predicted_metric: rec.predicted_metric,
            predicted_change_pct: rec.predicted_change_pct,
            confidence: rec.confidence,
            actual_change_pct: None,
            verified: false,
        };

        sqlx::query(
            "INSERT INTO predictions \
               (id, client_id, campaign_id, issued_on, action, predicted_metric, \
                predicted_change_pct, confidence, actual_change_pct, verified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, 0)",
        )
        .bind(prediction.id.to_string())
        .bind(&prediction.client_id)
        .bind(&prediction.campaign_id)
        .bind(prediction.issued_on)
        .bind(prediction.action.as_str())
        .bind(prediction.predicted_metric.as_str())
        .bind(prediction.predicted_change_pct)
        .bind(prediction.confidence)
        .execute(&mut *tx)
        .await?;

        out.push(prediction);
    }

    let cutoff = issued_on - Duration::days(retention_days);
    sqlx::query("DELETE FROM predictions WHERE client_id = ? AND issued_on < ?")
        .bind(client_id)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(out)
}

pub async fn load_for_client(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Vec<Prediction>, StorageError> {
    let rows = sqlx::query_as::<_, PredictionRow>(&format!(
        "SELECT {PREDICTION_COLUMNS} FROM predictions \
         WHERE client_id = ? \
         ORDER BY issued_on ASC, id ASC"
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_into_prediction).collect()
}

pub async fn load_unverified_issued_since(
    pool: &SqlitePool,
    client_id: &str,
    since: NaiveDate,
) -> Result<Vec<Prediction>, StorageError> {
    let rows = sqlx::query_as::<_, PredictionRow>(&format!(
        "SELECT {PREDICTION_COLUMNS} FROM predictions \
         WHERE client_id = ? AND verified = 0 AND issued_on >= ? \
         ORDER BY issued_on ASC, id ASC"
    ))
    .bind(client_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_into_prediction).collect()
}

/// The verifier's one allowed mutation. A second call for the same id is a
/// no-op because the row is already verified.
pub async fn mark_verified(
    pool: &SqlitePool,
    id: Uuid,
    actual_change_pct: f64,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE predictions SET actual_change_pct = ?, verified = 1 \
         WHERE id = ? AND verified = 0",
    )
    .bind(actual_change_pct)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_into_prediction(row: PredictionRow) -> Result<Prediction, StorageError> {
    let (
        id,
        client_id,
        campaign_id,
        issued_on,
        action,
        predicted_metric,
        predicted_change_pct,
        confidence,
        actual_change_pct,
        verified,
    ) = row;

    let id = Uuid::parse_str(&id)
        .map_err(|e| StorageError::corrupt(format!("bad prediction id {id}: {e}")))?;
    let action = RecommendedAction::parse(&action)
        .ok_or_else(|| StorageError::corrupt(format!("unknown prediction action {action}")))?;
    let predicted_metric = MetricKind::parse(&predicted_metric).ok_or_else(|| {
        StorageError::corrupt(format!("unknown predicted metric {predicted_metric}"))
    })?;

    Ok(Prediction {
        id,
        client_id,
        campaign_id,
        issued_on,
        action,
        predicted_metric,
        predicted_change_pct,
        confidence,
        actual_change_pct,
        verified,
    })
}
