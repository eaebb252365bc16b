//! Store façade: `open → prepare → resolve → access`.
//!
//! [`Store`] is an opened but unchecked database. Only [`Store::prepare`]
//! turns it into a [`PreparedStore`], and only a prepared store exposes
//! session and variable operations, so nothing can run against a store
//! that failed validation.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::model::{MetaEntry, SessionEntry, SessionId, VariableEntry};
use crate::schema::{self, Validity};
use crate::session::SessionRegistry;
use crate::variable::VariableStore;

/// An opened store that has not been validated yet.
pub struct Store {
    db: Database,
    config: StoreConfig,
    read_only: bool,
}

impl Store {
    /// Open (or create) the store file at `path`.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let db = Database::open(path, &config)?;
        Ok(Self {
            db,
            config,
            read_only: false,
        })
    }

    /// Open an existing store file for inspection only. Nothing is
    /// created or written; [`Store::prepare`] on such a store fails unless
    /// it is already valid.
    pub fn open_read_only(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let db = Database::open_read_only(path, &config)?;
        Ok(Self {
            db,
            config,
            read_only: true,
        })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let db = Database::open_in_memory(&config)?;
        Ok(Self {
            db,
            config,
            read_only: false,
        })
    }

    /// Classify the store without modifying it.
    pub async fn classify(&self) -> StoreResult<Validity> {
        classify(&self.db, &self.config).await
    }

    /// Raw meta entries, readable even when the store is invalid.
    pub async fn meta_entries(&self) -> StoreResult<Vec<MetaEntry>> {
        self.db.execute(schema::meta_entries).await
    }

    /// Validate the store, initializing it first if it is empty.
    ///
    /// Fails with [`StoreError::Corrupted`] when the store is invalid; the
    /// connection is released as `self` is dropped and the file is left
    /// untouched. WAL is switched on only once the store is known good.
    #[instrument(skip(self), fields(schema_version = %self.config.schema_version))]
    pub async fn prepare(self) -> StoreResult<PreparedStore> {
        match classify(&self.db, &self.config).await? {
            Validity::Valid => info!("store is valid"),
            Validity::Empty => {
                info!("initializing empty store");
                let version = self.config.schema_version.clone();
                self.db
                    .execute_mut(move |conn| schema::initialize(conn, &version))
                    .await?;
            }
            Validity::Invalid(reason) => {
                warn!(%reason, "refusing to use store");
                return Err(StoreError::Corrupted(reason));
            }
        }

        if self.config.wal && !self.read_only {
            self.db.enable_wal().await?;
        }

        Ok(PreparedStore {
            sessions: SessionRegistry::new(self.db.clone()),
            variables: VariableStore::new(self.db.clone()),
            db: self.db,
            config: self.config,
        })
    }
}

/// A store that passed validation.
#[derive(Clone)]
pub struct PreparedStore {
    db: Database,
    config: StoreConfig,
    sessions: SessionRegistry,
    variables: VariableStore,
}

impl PreparedStore {
    /// The configuration this store was prepared with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Re-run classification. A prepared store reports
    /// [`Validity::Valid`] unless it was modified behind our back.
    pub async fn classify(&self) -> StoreResult<Validity> {
        classify(&self.db, &self.config).await
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// See [`SessionRegistry::resolve_id`].
    pub async fn resolve_session_id(&self, name: &str) -> StoreResult<SessionId> {
        self.sessions.resolve_id(name).await
    }

    /// See [`SessionRegistry::find`].
    pub async fn find_session(&self, name: &str) -> StoreResult<Option<SessionEntry>> {
        self.sessions.find(name).await
    }

    pub async fn list_sessions(&self) -> StoreResult<Vec<SessionEntry>> {
        self.sessions.list().await
    }

    /// See [`VariableStore::get`].
    pub async fn get(&self, session: SessionId, name: &str) -> StoreResult<Option<String>> {
        self.variables.get(session, name).await
    }

    /// See [`VariableStore::set`].
    pub async fn set(&self, session: SessionId, name: &str, value: &str) -> StoreResult<()> {
        self.variables.set(session, name, value).await
    }

    /// See [`VariableStore::unset`].
    pub async fn unset(&self, session: SessionId, name: &str) -> StoreResult<bool> {
        self.variables.unset(session, name).await
    }

    pub async fn list_variables(&self, session: SessionId) -> StoreResult<Vec<VariableEntry>> {
        self.variables.list(session).await
    }
}

async fn classify(db: &Database, config: &StoreConfig) -> StoreResult<Validity> {
    let expected = config.schema_version.clone();
    db.execute(move |conn| schema::classify(conn, &expected))
        .await
}

// ── tests ────────────────────────────────────────────────────────────
