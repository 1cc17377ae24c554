//! Authorization code service - the ISSUED → CONSUMED → GONE state machine
//!
//! The ISSUED → CONSUMED step is a compare-and-swap on the stored record, so
//! two concurrent exchanges of the same code can never both mint tokens.
//! Binding checks (client, redirect, PKCE) run before the swap: a failed
//! check leaves the code ISSUED and retryable until its TTL.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use homebase_core::{
    AuthError, AuthResult, AuthorizationCode, AuthorizeTransaction, CodeLifetime, CodeStatus,
    SharedClock, Store, TokenMaterial,
};
use tracing::{debug, info, warn};

use super::{generate_authorization_code, short};

pub type CodeStore = Arc<dyn Store<String, AuthorizationCode>>;

/// Bound on re-reads after losing a compare-and-swap race
const MAX_CONSUME_ATTEMPTS: usize = 3;

/// Extra delay before the scheduled eviction re-checks the clock
const EVICTION_SLACK: StdDuration = StdDuration::from_millis(250);

/// Result of a successful consume
#[derive(Debug, Clone)]
pub struct ConsumedCode {
    pub record: AuthorizationCode,
    /// `true` when this call replayed an earlier exchange inside the grace window
    pub replayed: bool,
}

pub struct AuthorizationCodeService {
    store: CodeStore,
    clock: SharedClock,
    lifetime: CodeLifetime,
}

impl AuthorizationCodeService {
    pub fn new(store: CodeStore, clock: SharedClock, lifetime: CodeLifetime) -> Self {
        Self {
            store,
            clock,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> CodeLifetime {
        self.lifetime
    }

    /// Mint a code for an approved transaction
    pub async fn issue(
        &self,
        tx: &AuthorizeTransaction,
        user_id: &str,
        tokens: TokenMaterial,
    ) -> AuthResult<String> {
        let code = generate_authorization_code();
        let record = AuthorizationCode::from_transaction(tx, user_id, tokens, self.clock.now());
        self.save(code.clone(), record).await?;
        Ok(code)
    }

    /// Store a freshly issued code
    pub async fn save(&self, code: String, record: AuthorizationCode) -> AuthResult<()> {
        info!(
            client_id = %record.client_id,
            pkce = record.code_challenge.is_some(),
            "[Codes] Issued code {}",
            short(&code)
        );
        self.store
            .put(code, AuthorizationCode {
                used_at: None,
                ..record
            })
            .await
            .map_err(AuthError::upstream)
    }

    /// Consume a code.
    ///
    /// `verify` runs against the stored record before any state change and on
    /// every replay. Its error is returned as-is and leaves the code untouched.
    /// `Ok(None)` means unknown, expired, or replayed after the grace window.
    pub async fn consume<F>(&self, code: &str, verify: F) -> AuthResult<Option<ConsumedCode>>
    where
        F: Fn(&AuthorizationCode) -> AuthResult<()>,
    {
        let key = code.to_string();

        for _ in 0..MAX_CONSUME_ATTEMPTS {
            let Some(record) = self.store.get(&key).await.map_err(AuthError::upstream)? else {
                debug!("[Codes] Unknown code {}", short(code));
                return Ok(None);
            };

            let now = self.clock.now();
            match record.status(now, &self.lifetime) {
                CodeStatus::Expired => {
                    debug!("[Codes] Code {} expired, evicting", short(code));
                    self.store.delete(&key).await.map_err(AuthError::upstream)?;
                    return Ok(None);
                }
                CodeStatus::ReplayWindowClosed => {
                    warn!(
                        client_id = %record.client_id,
                        "[Codes] Code {} reused after grace window, evicting",
                        short(code)
                    );
                    self.store.delete(&key).await.map_err(AuthError::upstream)?;
                    return Ok(None);
                }
                CodeStatus::Replayable => {
                    verify(&record)?;
                    info!(
                        client_id = %record.client_id,
                        "[Codes] Replaying exchange of code {} within grace window",
                        short(code)
                    );
                    return Ok(Some(ConsumedCode {
                        record,
                        replayed: true,
                    }));
                }
                CodeStatus::Issued => {
                    verify(&record)?;

                    let consumed = record.consumed_at(now);
                    let swapped = self
                        .store
                        .compare_and_swap(&key, &record, consumed.clone())
                        .await
                        .map_err(AuthError::upstream)?;

                    if swapped {
                        info!(
                            client_id = %consumed.client_id,
                            "[Codes] Code {} consumed",
                            short(code)
                        );
                        self.schedule_eviction(key);
                        return Ok(Some(ConsumedCode {
                            record: consumed,
                            replayed: false,
                        }));
                    }

                    debug!(
                        "[Codes] Lost consume race for code {}, re-reading",
                        short(code)
                    );
                }
            }
        }

        Err(AuthError::upstream(format!(
            "code {} kept changing during consume",
            short(code)
        )))
    }

    /// Delete the code once its grace window has passed.
    ///
    /// The task re-checks the clock and leaves the record alone if it is
    /// still replayable; lazy expiry and the sweeper handle it later.
    fn schedule_eviction(&self, key: String) {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let lifetime = self.lifetime;
        let delay = lifetime.grace.to_std().unwrap_or_default() + EVICTION_SLACK;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let record = match store.get(&key).await {
                Ok(Some(record)) => record,
                Ok(None) => return,
                Err(e) => {
                    warn!("[Codes] Scheduled eviction read failed: {}", e);
                    return;
                }
            };

            match record.status(clock.now(), &lifetime) {
                CodeStatus::Issued | CodeStatus::Replayable => {
                    debug!("[Codes] Code {} still in grace window, keeping", short(&key));
                }
                CodeStatus::Expired | CodeStatus::ReplayWindowClosed => {
                    if let Err(e) = store.delete(&key).await {
                        warn!("[Codes] Scheduled eviction failed: {}", e);
                    } else {
                        debug!("[Codes] Evicted code {}", short(&key));
                    }
                }
            }
        });
    }

    /// Evict every code past its TTL or grace window
    pub async fn sweep(&self) -> AuthResult<usize> {
        let now = self.clock.now();
        let mut evicted = 0;
        for (code, record) in self.store.entries().await.map_err(AuthError::upstream)? {
            if matches!(
                record.status(now, &self.lifetime),
                CodeStatus::Expired | CodeStatus::ReplayWindowClosed
            ) {
                self.store.delete(&code).await.map_err(AuthError::upstream)?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}
