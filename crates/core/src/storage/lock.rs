use crate::storage::StorageError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

// SQLite has no session-scoped advisory locks, so the guard against
// concurrent digest runs for the same report date is a primary-keyed lock
// row: whoever inserts it first owns the run.
pub async fn try_acquire_digest_lock(
    pool: &SqlitePool,
    client_id: &str,
    report_date: NaiveDate,
) -> Result<bool, StorageError> {
    let locked_at: DateTime<Utc> = Utc::now();
    let res = sqlx::query(
        "INSERT OR IGNORE INTO digest_run_locks (client_id, report_date, locked_at) \
         VALUES (?, ?, ?)",
    )
    .bind(client_id)
    .bind(report_date)
    .bind(locked_at)
    .execute(pool)
    .await?;

    Ok(res.rows_affected() == 1)
}

pub async fn release_digest_lock(
    pool: &SqlitePool,
    client_id: &str,
    report_date: NaiveDate,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM digest_run_locks WHERE client_id = ? AND report_date = ?")
        .bind(client_id)
        .bind(report_date)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        storage::migrate(&pool).await.expect("migrations");
        let date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();

        assert!(try_acquire_digest_lock(&pool, "acme", date).await.unwrap());
        assert!(!try_acquire_digest_lock(&pool, "acme", date).await.unwrap());

        release_digest_lock(&pool, "acme", date).await.unwrap();
        assert!(try_acquire_digest_lock(&pool, "acme", date).await.unwrap());
    }
}
