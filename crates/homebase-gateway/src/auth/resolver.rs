//! Credential resolver
//!
//! Classifies a bearer credential by prefix and resolves it through exactly
//! one verification path:
//!
//! - `hb_…` API key → SHA-256 hash → key verification RPC
//! - anything else → identity-provider session introspection
//!
//! Every failure collapses to `None`. Callers answer with a generic 401.

use std::sync::Arc;
use std::time::Duration;

use homebase_core::{
    api_key_hash, ApiKeyVerifier, AuthContext, Credential, IdentityProvider, SharedClock,
};
use tracing::{debug, warn};

pub struct CredentialResolver {
    api_keys: Arc<dyn ApiKeyVerifier>,
    identity: Arc<dyn IdentityProvider>,
    clock: SharedClock,
    timeout: Duration,
}

impl CredentialResolver {
    pub fn new(
        api_keys: Arc<dyn ApiKeyVerifier>,
        identity: Arc<dyn IdentityProvider>,
        clock: SharedClock,
        timeout: Duration,
    ) -> Self {
        Self {
            api_keys,
            identity,
            clock,
            timeout,
        }
    }

    /// Resolve an `Authorization` header value
    pub async fn resolve_header(&self, header: Option<&str>) -> Option<(AuthContext, Credential)> {
        let credential = Credential::from_authorization_header(header)?;
        let context = self.resolve(&credential).await?;
        Some((context, credential))
    }

    /// Resolve a classified credential
    pub async fn resolve(&self, credential: &Credential) -> Option<AuthContext> {
        match credential {
            Credential::ApiKey(key) => self.resolve_api_key(key).await,
            Credential::Assertion(token) => self.resolve_assertion(token).await,
        }
    }

    async fn resolve_api_key(&self, key: &str) -> Option<AuthContext> {
        let key_hash = api_key_hash(key);

        let record = match tokio::time::timeout(self.timeout, self.api_keys.verify(&key_hash)).await
        {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                debug!("[Auth] Unknown API key {}…", &key_hash[..8]);
                return None;
            }
            Ok(Err(e)) => {
                warn!("[Auth] API key verification failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "[Auth] API key verification timed out after {:?}",
                    self.timeout
                );
                return None;
            }
        };

        if !record.is_usable(self.clock.now()) {
            debug!(
                key_id = %record.key_id,
                active = record.is_active,
                "[Auth] API key inactive or expired"
            );
            return None;
        }
        if record.user_id.trim().is_empty() {
            warn!(key_id = %record.key_id, "[Auth] API key has no owning user");
            return None;
        }

        self.spawn_touch_usage(key_hash);
        Some(AuthContext::api_key(&record))
    }

    /// Best-effort usage tracking; the outcome is only ever logged
    fn spawn_touch_usage(&self, key_hash: String) {
        let api_keys = self.api_keys.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, api_keys.touch_usage(&key_hash)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[Auth] Failed to record API key usage: {}", e),
                Err(_) => warn!("[Auth] Recording API key usage timed out"),
            }
        });
    }

    async fn resolve_assertion(&self, token: &str) -> Option<AuthContext> {
        match tokio::time::timeout(self.timeout, self.identity.current_user(token)).await {
            Ok(Ok(Some(user))) if !user.user_id.is_empty() => Some(AuthContext::bearer(user.user_id)),
            Ok(Ok(_)) => {
                debug!("[Auth] Identity provider rejected bearer assertion");
                None
            }
            Ok(Err(e)) => {
                warn!("[Auth] Identity provider introspection failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "[Auth] Identity provider introspection timed out after {:?}",
                    self.timeout
                );
                None
            }
        }
    }
}
