//! Registered OAuth client - loaded once at startup, immutable afterwards

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An OAuth client known to the authorization server
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredClient {
    /// Unique identifier
    pub client_id: String,

    /// Shared secret for confidential clients (public clients have none)
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,

    /// Exact redirect URIs this client may use
    pub redirect_uris: BTreeSet<String>,

    /// Scopes this client may request
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Display name for the approval page
    #[serde(default)]
    pub client_name: Option<String>,
}

impl RegisteredClient {
    /// Create a public client
    pub fn public(
        client_id: impl Into<String>,
        redirect_uris: impl IntoIterator<Item = impl Into<String>>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            client_name: None,
        }
    }

    /// Attach a client secret, making this a confidential client
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Exact set membership, no prefix or normalization matching
    pub fn is_redirect_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }

    /// Whether every requested scope is registered for this client
    pub fn allows_scopes(&self, requested: &BTreeSet<String>) -> bool {
        requested.is_subset(&self.scopes)
    }

    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Name to show on the approval page
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_id)
    }
}

impl std::fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredClient")
            .field("client_id", &self.client_id)
            .field("confidential", &self.is_confidential())
            .field("redirect_uris", &self.redirect_uris)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Split a space-delimited OAuth scope string
pub fn parse_scopes(scope: Option<&str>) -> BTreeSet<String> {
    scope
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
