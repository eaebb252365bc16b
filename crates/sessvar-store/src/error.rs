//! Error types for the sessvar-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! "No value set" is not an error: lookups that may legitimately come up
//! empty return `Option`.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::InvalidReason;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be created or opened.
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The store failed schema validation and must not be used.
    #[error("store is corrupted: {0}")]
    Corrupted(InvalidReason),

    /// More than one session row carries the same name.
    #[error("{count} sessions share the name '{name}'")]
    DuplicateSession { name: String, count: usize },

    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// The store configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
