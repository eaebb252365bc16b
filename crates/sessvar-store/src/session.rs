//! Session name resolution.
//!
//! Maps a human-readable session name to the store-assigned [`SessionId`],
//! creating the session on first use. The `UNIQUE` constraint on
//! `sessions.name` is what actually guarantees one row per name; the scan
//! here only decides whether an insert is needed, and reports a broken
//! invariant instead of picking a row when it sees more than one.

use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info, instrument, warn};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::model::{SessionEntry, SessionId};

/// Lookup and lazy creation of sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    db: Database,
}

impl SessionRegistry {
    /// Only handed out by a prepared store.
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Return the id of session `name`, creating the session if needed.
    ///
    /// Calling this repeatedly with the same name, from this process or
    /// another, always yields the same id.
    #[instrument(skip(self))]
    pub async fn resolve_id(&self, name: &str) -> StoreResult<SessionId> {
        let name = name.to_string();
        self.db.execute(move |conn| resolve(conn, &name)).await
    }

    /// Look up session `name` without creating it.
    #[instrument(skip(self))]
    pub async fn find(&self, name: &str) -> StoreResult<Option<SessionEntry>> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let ids = matching_ids(conn, &name)?;
                match ids.as_slice() {
                    [] => Ok(None),
                    [id] => Ok(Some(SessionEntry { id: *id, name })),
                    _ => Err(StoreError::DuplicateSession {
                        count: ids.len(),
                        name,
                    }),
                }
            })
            .await
    }

    /// All sessions, oldest first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> StoreResult<Vec<SessionEntry>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT id, name FROM sessions ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(SessionEntry {
                            id: SessionId(row.get(0)?),
                            name: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

fn resolve(conn: &Connection, name: &str) -> StoreResult<SessionId> {
    let ids = matching_ids(conn, name)?;
    match ids.as_slice() {
        [id] => {
            debug!(session_id = %id, "session found");
            return Ok(*id);
        }
        [] => {}
        _ => return Err(duplicate(name, ids.len())),
    }
    create(conn, name)
}

/// Insert session `name`, assuming a scan just found no row for it.
///
/// Plain INSERT: a concurrent creator makes this fail instead of producing
/// a second row, and the winner's row is then looked up again.
fn create(conn: &Connection, name: &str) -> StoreResult<SessionId> {
    match conn.execute("INSERT INTO sessions (name) VALUES (?1)", [name]) {
        Ok(_) => {
            let id = SessionId(conn.last_insert_rowid());
            info!(session_id = %id, "session created");
            Ok(id)
        }
        Err(rusqlite::Error::SqliteFailure(err, msg))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            debug!("session inserted concurrently, rescanning");
            let ids = matching_ids(conn, name)?;
            match ids.as_slice() {
                [id] => Ok(*id),
                [] => Err(rusqlite::Error::SqliteFailure(err, msg).into()),
                _ => Err(duplicate(name, ids.len())),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn matching_ids(conn: &Connection, name: &str) -> StoreResult<Vec<SessionId>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM sessions WHERE name = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map([name], |row| Ok(SessionId(row.get(0)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn duplicate(name: &str, count: usize) -> StoreError {
    warn!(name, count, "session name is not unique");
    StoreError::DuplicateSession {
        name: name.to_string(),
        count,
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::schema;

    async fn setup_db() -> Database {
        let db = Database::open_in_memory(&StoreConfig::default()).unwrap();
        db.execute_mut(|conn| schema::initialize(conn, "0.1"))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn first_resolve_creates_session_one() {
        let registry = SessionRegistry::new(setup_db().await);
        assert_eq!(registry.resolve_id("alice").await.unwrap(), SessionId(1));
    }

    #[tokio::test]
    async fn resolve_is_stable() {
        let db = setup_db().await;
        let registry = SessionRegistry::new(db.clone());

        let first = registry.resolve_id("alice").await.unwrap();
        let second = registry.resolve_id("alice").await.unwrap();
        assert_eq!(first, second);

        let rows: i64 = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT count(*) FROM sessions WHERE name = 'alice'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_ids() {
        let registry = SessionRegistry::new(setup_db().await);

        let alice = registry.resolve_id("alice").await.unwrap();
        let bob = registry.resolve_id("bob").await.unwrap();
        assert_ne!(alice, bob);
        assert_eq!(registry.resolve_id("alice").await.unwrap(), alice);
    }

    #[tokio::test]
    async fn find_does_not_create() {
        let registry = SessionRegistry::new(setup_db().await);

        assert!(registry.find("ghost").await.unwrap().is_none());
        assert!(registry.list().await.unwrap().is_empty());

        let id = registry.resolve_id("ghost").await.unwrap();
        let found = registry.find("ghost").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "ghost");
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let registry = SessionRegistry::new(setup_db().await);
        registry.resolve_id("zed").await.unwrap();
        registry.resolve_id("amy").await.unwrap();

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["zed", "amy"]);
    }

    fn initialized_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::initialize(&mut conn, "0.1").unwrap();
        conn
    }

    #[test]
    fn create_after_concurrent_insert_returns_the_winner() {
        // Another invocation created the session between our scan and insert.
        let conn = initialized_conn();
        conn.execute("INSERT INTO sessions (name) VALUES ('alice')", [])
            .unwrap();
        let winner = SessionId(conn.last_insert_rowid());

        assert_eq!(create(&conn, "alice").unwrap(), winner);
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn create_conflict_with_duplicate_rows_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
             INSERT INTO sessions (name) VALUES ('alice');
             INSERT INTO sessions (name) VALUES ('alice');
             CREATE TRIGGER reject_insert BEFORE INSERT ON sessions
             BEGIN SELECT RAISE(ABORT, 'conflict'); END;",
        )
        .unwrap();

        assert!(matches!(
            create(&conn, "alice"),
            Err(StoreError::DuplicateSession { count: 2, .. })
        ));
    }

    #[test]
    fn create_conflict_without_winner_reraises() {
        let conn = initialized_conn();
        conn.execute_batch(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON sessions
             BEGIN SELECT RAISE(ABORT, 'conflict'); END;",
        )
        .unwrap();

        match create(&conn, "alice") {
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))) => {
                assert_eq!(err.code, ErrorCode::ConstraintViolation);
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn non_conflict_insert_errors_propagate() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            create(&conn, "alice"),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        // A sessions table that bypasses the unique constraint.
        let db = Database::open_in_memory(&StoreConfig::default()).unwrap();
        db.execute(|conn| {
            conn.execute_batch(
                "CREATE TABLE sessions (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
                 INSERT INTO sessions (name) VALUES ('alice');
                 INSERT INTO sessions (name) VALUES ('alice');",
            )?;
            Ok(())
        })
        .await
        .unwrap();
        let registry = SessionRegistry::new(db);

        let err = registry.resolve_id("alice").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateSession { ref name, count: 2 } if name == "alice"
        ));
        assert!(matches!(
            registry.find("alice").await,
            Err(StoreError::DuplicateSession { count: 2, .. })
        ));
    }
}
