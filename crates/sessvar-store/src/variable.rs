//! Per-session variables.
//!
//! A variable is identified by `(session_id, name)`. Reads return `None`
//! when nothing has been set; writes insert on first use and update the
//! value in place afterwards.

use rusqlite::{OptionalExtension, TransactionBehavior};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;
use crate::model::{SessionId, VariableEntry};

/// Get/set access to session variables.
#[derive(Clone)]
pub struct VariableStore {
    db: Database,
}

impl VariableStore {
    /// Only handed out by a prepared store.
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the value of `name` in `session`, or `None` if it was never set.
    #[instrument(skip(self))]
    pub async fn get(&self, session: SessionId, name: &str) -> StoreResult<Option<String>> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM variables WHERE session_id = ?1 AND name = ?2",
                        rusqlite::params![session.get(), name],
                        |row| row.get(0),
                    )
                    .optional()?;
                if value.is_none() {
                    debug!("variable not set");
                }
                Ok(value)
            })
            .await
    }

    /// Set `name` in `session` to `value`.
    ///
    /// The lookup and the write share one immediate transaction, so no
    /// reader ever sees a half-applied update.
    #[instrument(skip(self, value))]
    pub async fn set(&self, session: SessionId, name: &str, value: &str) -> StoreResult<()> {
        let name = name.to_string();
        let value = value.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let exists = tx
                    .query_row(
                        "SELECT 1 FROM variables WHERE session_id = ?1 AND name = ?2",
                        rusqlite::params![session.get(), name],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

                if exists {
                    tx.execute(
                        "UPDATE variables SET value = ?3 WHERE session_id = ?1 AND name = ?2",
                        rusqlite::params![session.get(), name, value],
                    )?;
                    debug!("variable updated");
                } else {
                    tx.execute(
                        "INSERT INTO variables (session_id, name, value) VALUES (?1, ?2, ?3)",
                        rusqlite::params![session.get(), name, value],
                    )?;
                    debug!("variable created");
                }

                tx.commit()?;
                Ok(())
            })
            .await
    }

    /// Remove `name` from `session`, returning `true` if it existed.
    #[instrument(skip(self))]
    pub async fn unset(&self, session: SessionId, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM variables WHERE session_id = ?1 AND name = ?2",
                    rusqlite::params![session.get(), name],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// All variables of `session`, sorted by name.
    #[instrument(skip(self))]
    pub async fn list(&self, session: SessionId) -> StoreResult<Vec<VariableEntry>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, name, value FROM variables \
                     WHERE session_id = ?1 ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([session.get()], |row| {
                        Ok(VariableEntry {
                            session_id: SessionId(row.get(0)?),
                            name: row.get(1)?,
                            value: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::StoreError;
    use crate::schema;

    async fn setup() -> (Database, VariableStore, SessionId) {
        let db = Database::open_in_memory(&StoreConfig::default()).unwrap();
        db.execute_mut(|conn| schema::initialize(conn, "0.1"))
            .await
            .unwrap();
        let session = db
            .execute(|conn| {
                conn.execute("INSERT INTO sessions (name) VALUES ('alice')", [])?;
                Ok(SessionId(conn.last_insert_rowid()))
            })
            .await
            .unwrap();
        (db.clone(), VariableStore::new(db), session)
    }

    async fn row_count(db: &Database, session: SessionId, name: &'static str) -> i64 {
        db.execute(move |conn| {
            Ok(conn.query_row(
                "SELECT count(*) FROM variables WHERE session_id = ?1 AND name = ?2",
                rusqlite::params![session.get(), name],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn get_unset_returns_none() {
        let (_db, vars, session) = setup().await;
        assert_eq!(vars.get(session, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get() {
        let (_db, vars, session) = setup().await;
        vars.set(session, "color", "x").await.unwrap();
        assert_eq!(
            vars.get(session, "color").await.unwrap(),
            Some("x".to_string())
        );
    }

    #[tokio::test]
    async fn set_overwrites_without_duplicating() {
        let (db, vars, session) = setup().await;
        vars.set(session, "color", "blue").await.unwrap();
        vars.set(session, "color", "red").await.unwrap();

        assert_eq!(
            vars.get(session, "color").await.unwrap(),
            Some("red".to_string())
        );
        assert_eq!(row_count(&db, session, "color").await, 1);
    }

    #[tokio::test]
    async fn empty_value_is_distinct_from_unset() {
        let (_db, vars, session) = setup().await;
        vars.set(session, "blank", "").await.unwrap();
        assert_eq!(vars.get(session, "blank").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn variables_are_scoped_to_their_session() {
        let (db, vars, alice) = setup().await;
        let bob = db
            .execute(|conn| {
                conn.execute("INSERT INTO sessions (name) VALUES ('bob')", [])?;
                Ok(SessionId(conn.last_insert_rowid()))
            })
            .await
            .unwrap();

        vars.set(alice, "color", "blue").await.unwrap();
        assert_eq!(vars.get(bob, "color").await.unwrap(), None);

        vars.set(bob, "color", "green").await.unwrap();
        assert_eq!(
            vars.get(alice, "color").await.unwrap(),
            Some("blue".to_string())
        );
    }

    #[tokio::test]
    async fn unset_removes_value() {
        let (_db, vars, session) = setup().await;
        vars.set(session, "color", "blue").await.unwrap();

        assert!(vars.unset(session, "color").await.unwrap());
        assert!(!vars.unset(session, "color").await.unwrap());
        assert_eq!(vars.get(session, "color").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let (_db, vars, session) = setup().await;
        vars.set(session, "size", "L").await.unwrap();
        vars.set(session, "color", "blue").await.unwrap();

        let listed = vars.list(session).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["color", "size"]);
        assert!(listed.iter().all(|v| v.session_id == session));
    }

    #[tokio::test]
    async fn set_for_unknown_session_is_a_storage_error() {
        let (_db, vars, _session) = setup().await;
        let err = vars.set(SessionId(999), "color", "blue").await.unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
