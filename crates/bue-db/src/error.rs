use thiserror::Error;

/// Local cache failures. These are fatal for the operation that hit them and
/// are never retried by the store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Undecodable saved_users column: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Event store lock poisoned")]
    LockPoisoned,

    #[error("Event id must not be empty")]
    InvalidId,
}

pub type StorageResult<T> = Result<T, StorageError>;
