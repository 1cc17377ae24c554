//! Token exchange - redeem an authorization code for the token material bound to it

use std::sync::Arc;

use homebase_core::{pkce, AuthError, AuthResult, AuthorizationCode, TokenResponse};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::{short, AuthorizationCodeService, ClientRegistry};

/// OAuth token request body (form-encoded)
#[derive(Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("has_code", &self.code.is_some())
            .field("has_client_secret", &self.client_secret.is_some())
            .field("has_code_verifier", &self.code_verifier.is_some())
            .finish()
    }
}

pub struct TokenExchange {
    registry: Arc<ClientRegistry>,
    codes: Arc<AuthorizationCodeService>,
}

impl TokenExchange {
    pub fn new(registry: Arc<ClientRegistry>, codes: Arc<AuthorizationCodeService>) -> Self {
        Self { registry, codes }
    }

    /// Run the authorization_code grant
    pub async fn exchange(&self, request: &TokenRequest) -> AuthResult<TokenResponse> {
        match request.grant_type.as_deref() {
            Some("authorization_code") => {}
            Some(other) => {
                warn!("[OAuth] Unsupported grant_type: {}", other);
                return Err(AuthError::UnsupportedGrantType(format!(
                    "Only authorization_code is supported (got '{}')",
                    other
                )));
            }
            None => return Err(AuthError::invalid_request("Missing grant_type")),
        }

        let code = request
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing authorization code"))?;
        let client_id = request
            .client_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing client_id"))?;

        self.authenticate_client(client_id, request.client_secret.as_deref())?;

        let consumed = self
            .codes
            .consume(code, |record| check_binding(record, client_id, request))
            .await?
            .ok_or_else(|| {
                warn!(client_id = %client_id, "[OAuth] Unknown, expired or reused code {}", short(code));
                AuthError::invalid_grant("Authorization code is invalid or expired")
            })?;

        info!(
            client_id = %client_id,
            replayed = consumed.replayed,
            "[OAuth] Token issued for code {}",
            short(code)
        );

        Ok(consumed.record.token_response())
    }

    /// Check the client is registered and, if confidential, presented its secret
    fn authenticate_client(&self, client_id: &str, presented: Option<&str>) -> AuthResult<()> {
        let client = self
            .registry
            .find(client_id)
            .ok_or_else(|| AuthError::invalid_client("Client not registered"))?;

        match (&client.client_secret, presented) {
            (None, _) => Ok(()),
            (Some(expected), Some(presented))
                if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) =>
            {
                Ok(())
            }
            (Some(_), _) => {
                warn!(client_id = %client_id, "[OAuth] Client authentication failed");
                Err(AuthError::invalid_client("Client authentication failed"))
            }
        }
    }
}

/// Binding checks that must pass before the code may be consumed or replayed
fn check_binding(
    record: &AuthorizationCode,
    client_id: &str,
    request: &TokenRequest,
) -> AuthResult<()> {
    if record.client_id != client_id {
        warn!(client_id = %client_id, "[OAuth] client_id mismatch on code exchange");
        return Err(AuthError::invalid_grant("Client ID mismatch"));
    }

    if let Some(redirect_uri) = request.redirect_uri.as_deref() {
        if redirect_uri != record.redirect_uri {
            warn!(client_id = %client_id, "[OAuth] redirect_uri mismatch on code exchange");
            return Err(AuthError::invalid_grant("Redirect URI mismatch"));
        }
    }

    match pkce::verify_code(record, request.code_verifier.as_deref())? {
        pkce::PkceCheck::Verified => {}
        pkce::PkceCheck::NotRequired => {
            warn!(
                client_id = %client_id,
                "[OAuth] Exchanging code issued without PKCE challenge"
            );
        }
    }

    Ok(())
}
