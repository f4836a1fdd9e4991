use std::fmt;

/// Failure classes at the persistence seam.
///
/// `Unavailable` is the recoverable class: read paths degrade to empty
/// history (fail-open) and log. `Corrupt` means the stored bytes cannot be
/// trusted and must reach an operator. Everything else propagates as `Db`.
#[derive(Debug)]
pub enum StorageError {
    Unavailable { detail: String },
    Corrupt { detail: String },
    Db(sqlx::Error),
}

impl StorageError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        StorageError::Unavailable {
            detail: detail.into(),
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        StorageError::Corrupt {
            detail: detail.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable { detail } => {
                write!(f, "store unavailable: {detail}")
            }
            StorageError::Corrupt { detail } => {
                write!(f, "stored state corrupt: {detail}")
            }
            StorageError::Db(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::unavailable(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::corrupt(e.to_string())
            }
            other => StorageError::Db(other),
        }
    }
}
