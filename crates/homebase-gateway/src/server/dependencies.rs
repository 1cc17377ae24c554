//! Dependency Injection Container
//!
//! Everything the gateway talks to is injected here, so tests can swap any
//! collaborator for an in-memory mock.

use std::sync::Arc;

use homebase_core::{
    ApiKeyVerifier, AuthorizationCode, AuthorizeTransaction, IdentityProvider, RateLimiter,
    SharedClock, SystemClock,
};
use homebase_storage::InMemoryStore;

use super::rate_limit::FixedWindowRateLimiter;
use crate::oauth::{ClientRegistry, CodeStore, TransactionStore};
use crate::upstream::RowStoreClients;

/// Dependency container for the gateway
#[derive(Clone)]
pub struct GatewayDependencies {
    pub registry: Arc<ClientRegistry>,
    pub transaction_store: TransactionStore,
    pub code_store: CodeStore,
    pub api_keys: Arc<dyn ApiKeyVerifier>,
    pub identity: Arc<dyn IdentityProvider>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub clock: SharedClock,
    /// Row store behind `/api/rows`; those routes answer 503 without it
    pub row_store: Option<RowStoreClients>,
}

/// Builder for GatewayDependencies
///
/// Registry and both credential collaborators are required. Stores default
/// to in-memory, the clock to wall time.
#[derive(Default)]
pub struct DependenciesBuilder {
    registry: Option<Arc<ClientRegistry>>,
    transaction_store: Option<TransactionStore>,
    code_store: Option<CodeStore>,
    api_keys: Option<Arc<dyn ApiKeyVerifier>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    clock: Option<SharedClock>,
    row_store: Option<RowStoreClients>,
}

impl DependenciesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<ClientRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_transaction_store(mut self, store: TransactionStore) -> Self {
        self.transaction_store = Some(store);
        self
    }

    pub fn with_code_store(mut self, store: CodeStore) -> Self {
        self.code_store = Some(store);
        self
    }

    pub fn with_api_key_verifier(mut self, api_keys: Arc<dyn ApiKeyVerifier>) -> Self {
        self.api_keys = Some(api_keys);
        self
    }

    pub fn with_identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_row_store(mut self, row_store: RowStoreClients) -> Self {
        self.row_store = Some(row_store);
        self
    }

    pub fn build(self) -> Result<GatewayDependencies, String> {
        Ok(GatewayDependencies {
            registry: self.registry.ok_or("registry is required")?,
            transaction_store: self.transaction_store.unwrap_or_else(|| {
                Arc::new(InMemoryStore::<String, AuthorizeTransaction>::new())
            }),
            code_store: self
                .code_store
                .unwrap_or_else(|| Arc::new(InMemoryStore::<String, AuthorizationCode>::new())),
            api_keys: self.api_keys.ok_or("api_keys is required")?,
            identity: self.identity.ok_or("identity is required")?,
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| Arc::new(FixedWindowRateLimiter::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            row_store: self.row_store,
        })
    }
}
