//! SQLite implementation of Store.
//!
//! Values are stored as JSON under a namespace so several stores can share
//! one database. Compare-and-swap is a conditional UPDATE on the serialized
//! value, so it stays atomic even with more than one connection open.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use homebase_core::{RepoResult, Store};
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::Database;

/// SQLite-backed store for string-keyed JSON values.
pub struct SqliteStore<V> {
    db: Arc<Mutex<Database>>,
    namespace: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqliteStore<V> {
    pub fn new(db: Arc<Mutex<Database>>, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
            _value: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<V: DeserializeOwned> SqliteStore<V> {
    fn decode(raw: &str) -> Result<V> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[async_trait]
impl<V> Store<String, V> for SqliteStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &String) -> RepoResult<Option<V>> {
        let db = self.db.lock().await;
        let raw: Option<String> = db
            .connection()
            .query_row(
                "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;

        raw.as_deref().map(Self::decode).transpose()
    }

    async fn put(&self, key: String, value: V) -> RepoResult<()> {
        let raw = serde_json::to_string(&value)?;
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO kv_entries (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.namespace, key, raw],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &String) -> RepoResult<Option<V>> {
        let db = self.db.lock().await;
        let raw = db.transaction(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                    params![self.namespace, key],
                    |row| row.get(0),
                )
                .optional()?;
            if raw.is_some() {
                conn.execute(
                    "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                    params![self.namespace, key],
                )?;
            }
            Ok(raw)
        })?;

        raw.as_deref().map(Self::decode).transpose()
    }

    async fn compare_and_swap(&self, key: &String, expected: &V, new: V) -> RepoResult<bool> {
        let expected = serde_json::to_string(expected)?;
        let new = serde_json::to_string(&new)?;

        let db = self.db.lock().await;
        let updated = db.connection().execute(
            "UPDATE kv_entries SET value = ?1, updated_at = datetime('now')
             WHERE namespace = ?2 AND key = ?3 AND value = ?4",
            params![new, self.namespace, key, expected],
        )?;

        Ok(updated == 1)
    }

    async fn entries(&self) -> RepoResult<Vec<(String, V)>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv_entries WHERE namespace = ?1 ORDER BY key")?;

        let rows = stmt
            .query_map(params![self.namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            match Self::decode(&raw) {
                Ok(value) => entries.push((key, value)),
                Err(e) => {
                    tracing::warn!(
                        "[SqliteStore:{}] Skipping undecodable entry '{}': {}",
                        self.namespace,
                        key,
                        e
                    );
                }
            }
        }
        Ok(entries)
    }
}
