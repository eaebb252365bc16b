//! Schema validation and initialization.
//!
//! Every open goes through [`classify`] before anything else touches the
//! store. A store is either fresh ([`Validity::Empty`]), carries the
//! version marker this build expects ([`Validity::Valid`]), or is something
//! we do not understand ([`Validity::Invalid`]). There is no automatic
//! migration: a version mismatch is always a hard stop.
//!
//! Table existence is checked through `sqlite_master` rather than by
//! interpreting error messages.
//!
//! These are **synchronous** functions — call them through
//! [`Database::execute`](crate::db::Database::execute).

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{MetaEntry, VERSION_KEY};

pub const META_TABLE: &str = "meta";
pub const SESSIONS_TABLE: &str = "sessions";
pub const VARIABLES_TABLE: &str = "variables";

/// Canonical schema. Uniqueness lives in the keys themselves so it holds
/// even when two processes race through a read-then-write sequence.
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS variables (
        session_id INTEGER NOT NULL REFERENCES sessions(id),
        name       TEXT NOT NULL,
        value      TEXT NOT NULL,
        PRIMARY KEY (session_id, name)
    );
"#;

/// Column names of each canonical table, in declaration order.
const CANONICAL_COLUMNS: [(&str, &[&str]); 3] = [
    (META_TABLE, &["key", "value"]),
    (SESSIONS_TABLE, &["id", "name"]),
    (VARIABLES_TABLE, &["session_id", "name", "value"]),
];

/// Result of inspecting a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// No version marker and no data: safe to initialize.
    Empty,
    /// Version marker matches the expected version.
    Valid,
    /// The store must not be used.
    Invalid(InvalidReason),
}

/// Why a store was classified [`Validity::Invalid`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("no version marker, but meta has {meta_rows} row(s) and sessions has {session_rows} row(s)")]
    MissingVersion { meta_rows: u64, session_rows: u64 },

    #[error("schema version '{found}' does not match expected '{expected}'")]
    VersionMismatch { found: String, expected: String },

    #[error("version marker present but table '{0}' is missing")]
    MissingTable(&'static str),

    #[error("table '{table}' has columns ({}) which do not match this store", .columns.join(", "))]
    ForeignTable {
        table: &'static str,
        columns: Vec<String>,
    },
}

// ── public API ───────────────────────────────────────────────────────

/// Classify the store behind `conn` against `expected_version`.
///
/// Read-only. A failed version lookup of any kind counts as "no marker";
/// only the row counts that follow can surface a storage error.
#[instrument(skip(conn))]
pub fn classify(conn: &Connection, expected_version: &str) -> StoreResult<Validity> {
    let Some(found) = read_version(conn) else {
        let meta_rows = count_rows(conn, META_TABLE)?;
        let session_rows = count_rows(conn, SESSIONS_TABLE)?;

        if meta_rows > 0 || session_rows > 0 {
            warn!(meta_rows, session_rows, "store has data but no version marker");
            return Ok(Validity::Invalid(InvalidReason::MissingVersion {
                meta_rows,
                session_rows,
            }));
        }

        // Empty tables are only ours to fill if they have our shape.
        if let Some(reason) = foreign_table(conn)? {
            return Ok(Validity::Invalid(reason));
        }

        debug!("no version marker and no data, store is empty");
        return Ok(Validity::Empty);
    };

    if found != expected_version {
        warn!(found = %found, expected = %expected_version, "schema version mismatch");
        return Ok(Validity::Invalid(InvalidReason::VersionMismatch {
            found,
            expected: expected_version.to_string(),
        }));
    }

    for table in [SESSIONS_TABLE, VARIABLES_TABLE] {
        if !table_exists(conn, table)? {
            warn!(table, "versioned store is missing a table");
            return Ok(Validity::Invalid(InvalidReason::MissingTable(table)));
        }
    }
    if let Some(reason) = foreign_table(conn)? {
        return Ok(Validity::Invalid(reason));
    }

    debug!(version = %found, "store is valid");
    Ok(Validity::Valid)
}

/// Create the tables and write the version marker.
///
/// Precondition: the store classified [`Validity::Empty`]. Safe to call
/// more than once; the marker is written with `INSERT OR REPLACE`.
#[instrument(skip(conn))]
pub fn initialize(conn: &mut Connection, version: &str) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        rusqlite::params![VERSION_KEY, version],
    )?;
    tx.commit()?;

    info!(version, "initialized empty store");
    Ok(())
}

/// All meta entries, sorted by key. Empty when there is no meta table.
pub fn meta_entries(conn: &Connection) -> StoreResult<Vec<MetaEntry>> {
    if !table_exists(conn, META_TABLE)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare("SELECT key, value FROM meta ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MetaEntry {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether a table named `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Number of rows in `table`, or 0 when the table does not exist.
pub fn count_rows(conn: &Connection, table: &'static str) -> StoreResult<u64> {
    if !table_exists(conn, table)? {
        return Ok(0);
    }
    let count: i64 = conn.query_row(&format!("SELECT count(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;
    u64::try_from(count)
        .map_err(|_| StoreError::Sqlite(rusqlite::Error::IntegralValueOutOfRange(0, count)))
}

/// Column names of `table` in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}

// ── internals ────────────────────────────────────────────────────────

/// First existing canonical table whose columns differ from ours.
fn foreign_table(conn: &Connection) -> StoreResult<Option<InvalidReason>> {
    for (table, expected) in CANONICAL_COLUMNS {
        if !table_exists(conn, table)? {
            continue;
        }
        let columns = table_columns(conn, table)?;
        if !columns.iter().map(String::as_str).eq(expected.iter().copied()) {
            warn!(table, ?columns, "table has an unexpected shape");
            return Ok(Some(InvalidReason::ForeignTable { table, columns }));
        }
    }
    Ok(None)
}

fn read_version(conn: &Connection) -> Option<String> {
    match table_exists(conn, META_TABLE) {
        Ok(true) => {}
        Ok(false) => return None,
        Err(err) => {
            debug!(%err, "could not inspect meta table, treating version as absent");
            return None;
        }
    }

    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .unwrap_or_else(|err| {
        debug!(%err, "version lookup failed, treating version as absent");
        None
    })
}

// ── tests ────────────────────────────────────────────────────────────
