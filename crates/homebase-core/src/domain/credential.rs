//! Credentials, resolved auth context and the external API-key record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use zeroize::Zeroizing;

use crate::error::{AuthError, AuthResult};

/// Prefix that marks an opaque API key
pub const API_KEY_PREFIX: &str = "hb_";

/// The two kinds of bearer credential the gateway accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Long-lived opaque key verified by hash lookup
    ApiKey,
    /// Session-backed token validated by the identity provider
    BearerAssertion,
}

/// A raw bearer credential, classified once by prefix.
///
/// The token bytes are zeroed on drop and never printed.
pub enum Credential {
    ApiKey(Zeroizing<String>),
    Assertion(Zeroizing<String>),
}

impl Credential {
    /// Classify a raw token by prefix. This is the only place prefix sniffing happens.
    pub fn classify(token: &str) -> Self {
        let token = Zeroizing::new(token.to_string());
        if token.starts_with(API_KEY_PREFIX) {
            Credential::ApiKey(token)
        } else {
            Credential::Assertion(token)
        }
    }

    /// Extract and classify the credential from an `Authorization` header value.
    ///
    /// Returns `None` when the header is absent, not a Bearer scheme, or empty.
    pub fn from_authorization_header(header: Option<&str>) -> Option<Self> {
        let header = header?.trim();
        let (scheme, token) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(Self::classify(token))
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::ApiKey(_) => CredentialKind::ApiKey,
            Credential::Assertion(_) => CredentialKind::BearerAssertion,
        }
    }

    /// The raw token
    pub fn secret(&self) -> &str {
        match self {
            Credential::ApiKey(token) | Credential::Assertion(token) => token.as_str(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential::{:?}([REDACTED])", self.kind())
    }
}

/// One-way hash of an API key, as stored by the key record store
pub fn api_key_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Caller identity resolved for a single request. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthContext {
    pub subject_id: String,
    pub credential_kind: CredentialKind,
    /// Scope restriction; `None` means unrestricted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl AuthContext {
    /// Context for a verified API key
    pub fn api_key(record: &ApiKeyRecord) -> Self {
        Self {
            subject_id: record.user_id.clone(),
            credential_kind: CredentialKind::ApiKey,
            scopes: Some(record.scopes.iter().cloned().collect()),
            key_id: Some(record.key_id.clone()),
        }
    }

    /// Context for a validated bearer assertion (unrestricted)
    pub fn bearer(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            credential_kind: CredentialKind::BearerAssertion,
            scopes: None,
            key_id: None,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        match &self.scopes {
            None => true,
            Some(scopes) => scopes.contains(scope),
        }
    }

    /// Per-endpoint scope check
    pub fn require_scope(&self, scope: &str) -> AuthResult<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope(scope.to_string()))
        }
    }
}

/// API key record as returned by the external verification entry point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub key_id: String,
    pub user_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl ApiKeyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Active and not expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

/// User resolved by the identity provider's session introspection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityUser {
    #[serde(alias = "id")]
    pub user_id: String,
}
