//! Authorize transaction - an accepted /authorize request awaiting user approval

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::pkce::ChallengeMethod;

/// In-flight authorization request, keyed by an opaque transaction id.
///
/// Never mutated: it is either taken once on approval/denial or evicted
/// after its TTL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizeTransaction {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: ChallengeMethod,
    pub created_at: DateTime<Utc>,
}

impl AuthorizeTransaction {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: None,
            state: None,
            code_challenge: None,
            code_challenge_method: ChallengeMethod::Plain,
            created_at,
        }
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }

    /// Bind a PKCE challenge
    pub fn with_pkce(mut self, challenge: impl Into<String>, method: ChallengeMethod) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = method;
        self
    }

    /// Strictly older than `ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}
