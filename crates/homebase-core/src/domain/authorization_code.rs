//! Authorization Code Domain Model
//!
//! Codes are short-lived (10 minutes), bound to the PKCE challenge of the
//! transaction they came from, and transition from unused to used exactly once.
//! After use they stay readable for a short grace window so a client that
//! lost the first response can retry and receive the same tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorizeTransaction;
use crate::pkce::ChallengeMethod;

/// Lifetime policy for authorization codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLifetime {
    /// Maximum age since issue
    pub ttl: Duration,
    /// How long a consumed code stays replayable
    pub grace: Duration,
}

impl Default for CodeLifetime {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            grace: Duration::seconds(5),
        }
    }
}

/// Where a code sits in its lifecycle at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStatus {
    /// Not yet exchanged
    Issued,
    /// Exchanged, still inside the replay grace window
    Replayable,
    /// Older than the TTL
    Expired,
    /// Exchanged and the grace window has passed
    ReplayWindowClosed,
}

/// Token material handed to the client on exchange
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMaterial {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMaterial")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Successful token endpoint response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// An issued authorization code
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<ChallengeMethod>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl AuthorizationCode {
    /// Issue a code from an approved transaction.
    ///
    /// The PKCE challenge is copied verbatim; nothing after this point may change it.
    pub fn from_transaction(
        tx: &AuthorizeTransaction,
        user_id: impl Into<String>,
        tokens: TokenMaterial,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: tx.client_id.clone(),
            redirect_uri: tx.redirect_uri.clone(),
            user_id: user_id.into(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            scope: tx.scope.clone(),
            code_challenge: tx.code_challenge.clone(),
            code_challenge_method: tx.code_challenge.as_ref().map(|_| tx.code_challenge_method),
            created_at: now,
            used_at: None,
        }
    }

    /// Lifecycle state at `now`
    pub fn status(&self, now: DateTime<Utc>, lifetime: &CodeLifetime) -> CodeStatus {
        if now - self.created_at > lifetime.ttl {
            return CodeStatus::Expired;
        }
        match self.used_at {
            None => CodeStatus::Issued,
            Some(used_at) if now - used_at <= lifetime.grace => CodeStatus::Replayable,
            Some(_) => CodeStatus::ReplayWindowClosed,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Copy of this record marked as used at `now`
    pub fn consumed_at(&self, now: DateTime<Utc>) -> Self {
        Self {
            used_at: Some(now),
            ..self.clone()
        }
    }

    /// The response returned on exchange; identical for every replay
    pub fn token_response(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            token_type: "bearer".to_string(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in,
            scope: self.scope.clone(),
        }
    }
}

impl std::fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCode")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("user_id", &self.user_id)
            .field("scope", &self.scope)
            .field("pkce", &self.code_challenge_method)
            .field("created_at", &self.created_at)
            .field("used_at", &self.used_at)
            .finish_non_exhaustive()
    }
}
