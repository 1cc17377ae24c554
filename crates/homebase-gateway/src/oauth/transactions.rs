//! Transaction store service
//!
//! Holds accepted authorize requests until the user approves or denies them.
//! Expiry is checked lazily on every read; the sweeper only bounds memory.

use std::sync::Arc;

use chrono::Duration;
use homebase_core::{AuthError, AuthResult, AuthorizeTransaction, SharedClock, Store};
use tracing::{debug, info};

use super::{generate_transaction_id, short};

pub type TransactionStore = Arc<dyn Store<String, AuthorizeTransaction>>;

pub struct TransactionService {
    store: TransactionStore,
    clock: SharedClock,
    ttl: Duration,
}

impl TransactionService {
    pub fn new(store: TransactionStore, clock: SharedClock, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Store a transaction under a fresh id, stamping `created_at = now`
    pub async fn create(&self, tx: AuthorizeTransaction) -> AuthResult<String> {
        let tx_id = generate_transaction_id();
        self.insert(tx_id.clone(), tx).await?;
        Ok(tx_id)
    }

    /// Store a transaction under a caller-chosen id
    pub async fn insert(&self, tx_id: String, tx: AuthorizeTransaction) -> AuthResult<()> {
        let tx = AuthorizeTransaction {
            created_at: self.clock.now(),
            ..tx
        };
        info!(
            client_id = %tx.client_id,
            "[Transactions] Created transaction {}",
            short(&tx_id)
        );
        self.store.put(tx_id, tx).await.map_err(AuthError::upstream)
    }

    /// Read a live transaction; an expired one is evicted and reported absent
    pub async fn get(&self, tx_id: &str) -> AuthResult<Option<AuthorizeTransaction>> {
        let key = tx_id.to_string();
        let Some(tx) = self.store.get(&key).await.map_err(AuthError::upstream)? else {
            return Ok(None);
        };

        if tx.is_expired(self.clock.now(), self.ttl) {
            debug!("[Transactions] Evicting expired transaction {}", short(tx_id));
            self.store.delete(&key).await.map_err(AuthError::upstream)?;
            return Ok(None);
        }

        Ok(Some(tx))
    }

    /// Atomically remove and return a live transaction.
    ///
    /// Of several concurrent callers at most one receives it.
    pub async fn take(&self, tx_id: &str) -> AuthResult<Option<AuthorizeTransaction>> {
        let removed = self
            .store
            .delete(&tx_id.to_string())
            .await
            .map_err(AuthError::upstream)?;

        Ok(removed.filter(|tx| !tx.is_expired(self.clock.now(), self.ttl)))
    }

    pub async fn delete(&self, tx_id: &str) -> AuthResult<()> {
        self.store
            .delete(&tx_id.to_string())
            .await
            .map_err(AuthError::upstream)?;
        Ok(())
    }

    /// Evict every expired transaction. Returns how many were removed.
    pub async fn sweep(&self) -> AuthResult<usize> {
        let now = self.clock.now();
        let mut evicted = 0;
        for (tx_id, tx) in self.store.entries().await.map_err(AuthError::upstream)? {
            if tx.is_expired(now, self.ttl) {
                self.store.delete(&tx_id).await.map_err(AuthError::upstream)?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}
