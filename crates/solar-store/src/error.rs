//! Error types for solar-store.

use std::path::PathBuf;

/// Result type for solar-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in solar-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from the SQLite hot store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error from the cold object store backend.
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Failed to create a storage directory.
    #[error("Failed to create storage directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No cold partition exists for the requested date.
    #[error("Partition not found: {key}")]
    PartitionNotFound { key: String },

    /// The hot store holds no readings for the day being archived.
    #[error("No data found for day {day:02}")]
    NoData { day: u8 },

    /// A stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is transient and the same call may succeed if retried.
    ///
    /// Covers SQLite busy/locked conditions, object-store transport failures
    /// and raw I/O errors. Missing data and corrupt payloads are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Error::ObjectStore(e) => matches!(e, object_store::Error::Generic { .. }),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Whether the error means the requested data does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PartitionNotFound { .. } | Error::NoData { .. })
    }
}
