//! # sessvar-store
//!
//! Schema-validated SQLite store mapping session names to ids, and
//! `(session, variable)` pairs to string values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Store → PreparedStore (façade)         │
//! ├─────────────────────────────────────────┤
//! │  SessionRegistry   (name → id)          │
//! │  VariableStore     (id, name → value)   │
//! ├─────────────────────────────────────────┤
//! │  schema: classify / initialize          │
//! │  Database (rusqlite, spawn_blocking)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use sessvar_store::{Store, StoreConfig};
//!
//! let store = Store::open("sessions.db", StoreConfig::default())?
//!     .prepare()
//!     .await?;
//! let alice = store.resolve_session_id("alice").await?;
//! store.set(alice, "color", "blue").await?;
//! assert_eq!(store.get(alice, "color").await?.as_deref(), Some("blue"));
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod schema;
pub mod session;
pub mod store;
pub mod variable;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::{DEFAULT_SCHEMA_VERSION, StoreConfig};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use model::{MetaEntry, SessionEntry, SessionId, VERSION_KEY, VariableEntry};
pub use schema::{InvalidReason, Validity};
pub use session::SessionRegistry;
pub use store::{PreparedStore, Store};
pub use variable::VariableStore;
