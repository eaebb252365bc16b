//! Persisted record shapes.
//!
//! These are plain data: callers always receive owned copies, never
//! references into the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of the meta row holding the schema version marker.
pub const VERSION_KEY: &str = "version";

/// Store-assigned identifier of a session. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// The raw row id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A store-level key/value pair. Currently only the schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

/// A named namespace for variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: SessionId,
    pub name: String,
}

/// A named string value owned by one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub session_id: SessionId,
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_serializes_as_bare_integer() {
        let entry = SessionEntry {
            id: SessionId(7),
            name: "alice".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"alice"}"#);
    }
}
