//! Homebase Storage Layer
//!
//! Implementations of the `Store` trait for authorization state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            Code / Transaction services               │
//! ├──────────────────────────────────────────────────────┤
//! │                 Store<K, V> trait                    │
//! ├──────────────────────────┬───────────────────────────┤
//! │      InMemoryStore       │        SqliteStore        │
//! │  (DashMap, entry locks)  │  (kv_entries, CAS update) │
//! └──────────────────────────┴───────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use homebase_storage::{Database, SqliteStore, InMemoryStore};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let db = Arc::new(Mutex::new(Database::open(&path)?));
//! let codes = SqliteStore::<AuthorizationCode>::new(db.clone(), "codes");
//! let transactions = InMemoryStore::<String, AuthorizeTransaction>::new();
//! ```

mod database;
mod memory;
mod sqlite;

pub use database::Database;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Default database file name.
pub const DATABASE_FILE: &str = "homebase.db";

/// Get the default database path for the current platform.
pub fn default_database_path() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|p| p.join("homebase").join(DATABASE_FILE))
}
