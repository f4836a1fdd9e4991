pub mod error;
pub mod history;
pub mod lock;
pub mod predictions;
pub mod runs;

pub use error::StorageError;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Open (and create if missing) the embedded store. All writes go through
/// short single-connection transactions, so a small pool is plenty.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| StorageError::unavailable(format!("invalid database url: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| StorageError::unavailable(format!("database unavailable: {e}")))
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StorageError::corrupt(format!("migrations failed: {e}")))
}
