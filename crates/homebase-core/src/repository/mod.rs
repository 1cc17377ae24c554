//! Repository traits for data access
//!
//! These traits define the storage and collaborator interfaces without
//! specifying the implementation (in-memory, SQLite, HTTP, etc.)

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{ApiKeyRecord, IdentityUser};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Keyed store with an atomic compare-and-swap.
///
/// Every multi-step state change (consume a code, take a transaction) must go
/// through `compare_and_swap` or `delete` so that two concurrent callers can
/// never both observe the pre-transition value as current.
#[async_trait]
pub trait Store<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Read a value
    async fn get(&self, key: &K) -> RepoResult<Option<V>>;

    /// Insert or replace a value
    async fn put(&self, key: K, value: V) -> RepoResult<()>;

    /// Remove a value, returning what was removed. At most one caller gets `Some`.
    async fn delete(&self, key: &K) -> RepoResult<Option<V>>;

    /// Replace the value only if it still equals `expected`.
    ///
    /// Returns `true` if the swap happened.
    async fn compare_and_swap(&self, key: &K, expected: &V, new: V) -> RepoResult<bool>;

    /// Snapshot of all entries, used by the sweeper
    async fn entries(&self) -> RepoResult<Vec<(K, V)>>;
}

/// External API key verification entry point
#[async_trait]
pub trait ApiKeyVerifier: Send + Sync {
    /// Look up a key record by the hex SHA-256 of the raw key.
    ///
    /// `Ok(None)` means no such key.
    async fn verify(&self, key_hash: &str) -> RepoResult<Option<ApiKeyRecord>>;

    /// Record that the key with this hash was used.
    ///
    /// Best effort: callers log failures and never surface them.
    async fn touch_usage(&self, key_hash: &str) -> RepoResult<()>;
}

/// Identity provider session introspection
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind a bearer assertion.
    ///
    /// `Ok(None)` means the assertion was rejected.
    async fn current_user(&self, assertion: &str) -> RepoResult<Option<IdentityUser>>;
}

/// Fixed-window request limiter
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key`; `true` if it is over the limit
    fn is_limited(&self, key: &str, window: Duration, max_requests: u32) -> bool;

    /// Drop windows that have already ended. Returns how many were removed.
    fn evict_expired(&self) -> usize {
        0
    }
}
