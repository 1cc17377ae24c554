//! HTTP collaborators of the hosted data platform
//!
//! - `rows` - PostgREST-style row store, elevated or identity-scoped
//! - `api_keys` - the API key verification RPC
//! - `identity` - identity-provider session introspection

mod api_keys;
mod identity;
mod rows;

pub use api_keys::HttpApiKeyVerifier;
pub use identity::HttpIdentityProvider;
pub use rows::{RowStoreClient, RowStoreClients, ScopedRowStore};

use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Default RPC that looks up an API key record by hash
pub const DEFAULT_VERIFY_RPC: &str = "verify_api_key";
/// Default RPC that records API key usage
pub const DEFAULT_TOUCH_RPC: &str = "touch_api_key_usage";
/// Default bound on every upstream call
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the hosted data platform
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Project base URL, e.g. `https://xyz.example.co`
    pub base_url: String,
    /// Public key sent with identity-scoped requests
    pub anon_key: String,
    /// Service key; grants the elevated client
    pub service_key: Zeroizing<String>,
    pub timeout: Duration,
    pub verify_rpc: String,
    pub touch_rpc: String,
}

impl UpstreamConfig {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_key: Zeroizing::new(service_key.into()),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            verify_rpc: DEFAULT_VERIFY_RPC.to_string(),
            touch_rpc: DEFAULT_TOUCH_RPC.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rpc_names(mut self, verify: impl Into<String>, touch: impl Into<String>) -> Self {
        self.verify_rpc = verify.into();
        self.touch_rpc = touch.into();
        self
    }

    /// `{base}/rest/v1/{path}`
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `{base}/auth/v1/{path}`
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Shared HTTP client with the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build upstream HTTP client")
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("verify_rpc", &self.verify_rpc)
            .field("touch_rpc", &self.touch_rpc)
            .finish_non_exhaustive()
    }
}
