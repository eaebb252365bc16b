//! Store configuration.
//!
//! Every field has a default, so an empty `[store]` table (or no config
//! file at all) yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Schema version token written by this build when initializing a store.
pub const DEFAULT_SCHEMA_VERSION: &str = "0.1";

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Settings that control how a store is opened and validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Version token expected in the `meta` table. Compared for exact
    /// equality; there is no ordering between versions.
    pub schema_version: String,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging for on-disk stores.
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            wal: true,
        }
    }
}

impl StoreConfig {
    /// Replace the expected schema version.
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Reject configurations that could never describe a usable store.
    pub fn validate(&self) -> StoreResult<()> {
        if self.schema_version.trim().is_empty() {
            return Err(StoreError::Config(
                "schema_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
