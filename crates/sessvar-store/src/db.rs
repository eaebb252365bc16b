//! SQLite connection handling.
//!
//! [`Database`] owns the single connection of a store. Queries run on the
//! blocking pool via `tokio::task::spawn_blocking`, and the connection is
//! closed when the last clone is dropped.
//!
//! Opening never changes the journal mode: the file stays exactly as it
//! was until the store has been validated. [`Database::enable_wal`] is
//! called afterwards by the façade.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Thread-safe handle to a SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path`.
    ///
    /// Any failure here, including a file that is not a SQLite database,
    /// is reported as [`StoreError::Open`].
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path).map_err(|source| open_error(path, source))?;
        Self::from_connection(path, conn, config)
    }

    /// Open an existing database without write access. A missing file is
    /// an [`StoreError::Open`] error; nothing is ever created.
    pub fn open_read_only(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database read-only");

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(path, flags).map_err(|source| open_error(path, source))?;
        Self::from_connection(path, conn, config)
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory(config: &StoreConfig) -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, config)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn from_connection(path: &Path, conn: Connection, config: &StoreConfig) -> StoreResult<Self> {
        // SQLite reads the header lazily; force it so a non-database file
        // fails here and not in the first query after open.
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(|source| open_error(path, source))?;
        Self::apply_pragmas(&conn, config).map_err(|source| open_error(path, source))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// Schema checks and single-statement reads and writes go through
    /// here; anything needing a transaction uses [`Database::execute_mut`].
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await?
    }

    /// Like [`Database::execute`], with the `&mut Connection` that
    /// `Connection::transaction_with_behavior` requires.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await?
    }

    /// Switch the file to write-ahead logging. Only called on a store that
    /// passed validation.
    pub async fn enable_wal(&self) -> StoreResult<()> {
        self.execute(|conn| {
            let mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            debug!(journal_mode = %mode, "journal mode set");
            Ok(())
        })
        .await
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
        // Enforce the variables → sessions reference.
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // A lock held past this timeout surfaces as SQLITE_BUSY; we never retry.
        conn.busy_timeout(config.busy_timeout())?;

        debug!(busy_timeout_ms = config.busy_timeout_ms, "database pragmas applied");
        Ok(())
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
}

fn open_error(path: &Path, source: rusqlite::Error) -> StoreError {
    StoreError::Open {
        path: path.to_path_buf(),
        source,
    }
}

// ── tests ────────────────────────────────────────────────────────────
