//! In-memory store backed by DashMap.

use std::hash::Hash;

use async_trait::async_trait;
use dashmap::DashMap;
use homebase_core::{RepoResult, Store};

/// Process-local store. State is lost on restart.
pub struct InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Store<K, V> for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    async fn get(&self, key: &K) -> RepoResult<Option<V>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: K, value: V) -> RepoResult<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &K) -> RepoResult<Option<V>> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    async fn compare_and_swap(&self, key: &K, expected: &V, new: V) -> RepoResult<bool> {
        // The shard write lock is held for the whole compare and replace
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.value() == expected => {
                *entry.value_mut() = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn entries(&self) -> RepoResult<Vec<(K, V)>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}
