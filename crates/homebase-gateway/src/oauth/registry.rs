//! Client registry - loaded once from configuration, read-only afterwards

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{bail, Context, Result};
use homebase_core::{AuthError, AuthResult, RegisteredClient};
use serde::Deserialize;
use tracing::{info, warn};

/// Accepted document shapes: a bare array, or `{"clients": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ClientsDocument {
    List(Vec<RegisteredClient>),
    Wrapped { clients: Vec<RegisteredClient> },
}

/// Registered OAuth clients keyed by client_id
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: HashMap<String, RegisteredClient>,
}

impl ClientRegistry {
    /// Build a registry. An empty or ambiguous registry is a configuration error.
    pub fn new(clients: impl IntoIterator<Item = RegisteredClient>) -> Result<Self> {
        let mut map = HashMap::new();
        for client in clients {
            if client.redirect_uris.is_empty() {
                warn!(
                    "[ClientRegistry] Client '{}' has no redirect URIs and can never authorize",
                    client.client_id
                );
            }
            if let Some(previous) = map.insert(client.client_id.clone(), client) {
                bail!("Duplicate client_id in registry: {}", previous.client_id);
            }
        }

        if map.is_empty() {
            bail!("Client registry is empty; at least one client must be configured");
        }

        info!("[ClientRegistry] Loaded {} client(s)", map.len());
        Ok(Self { clients: map })
    }

    /// Parse a JSON document of clients
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ClientsDocument =
            serde_json::from_str(json).context("Failed to parse client registry JSON")?;
        let clients = match document {
            ClientsDocument::List(clients) => clients,
            ClientsDocument::Wrapped { clients } => clients,
        };
        Self::new(clients)
    }

    /// Load a JSON document of clients from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client registry at {:?}", path))?;
        Self::from_json(&json)
    }

    pub fn find(&self, client_id: &str) -> Option<&RegisteredClient> {
        self.clients.get(client_id)
    }

    pub fn is_redirect_allowed(&self, client: &RegisteredClient, redirect_uri: &str) -> bool {
        client.is_redirect_allowed(redirect_uri)
    }

    /// Resolve a client and check the redirect URI in one step
    pub fn validate(&self, client_id: &str, redirect_uri: &str) -> AuthResult<&RegisteredClient> {
        let client = self
            .find(client_id)
            .ok_or_else(|| AuthError::invalid_client("Client not registered"))?;

        if !self.is_redirect_allowed(client, redirect_uri) {
            return Err(AuthError::invalid_client(
                "Redirect URI not registered for this client",
            ));
        }

        Ok(client)
    }

    /// Union of every client's scopes, for server metadata
    pub fn supported_scopes(&self) -> BTreeSet<String> {
        self.clients
            .values()
            .flat_map(|client| client.scopes.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
