//! Authorize step - validate the request and turn it into a transaction

use std::sync::Arc;

use chrono::{DateTime, Utc};
use homebase_core::{
    parse_scopes, pkce::ChallengeMethod, AuthError, AuthorizeTransaction,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::ClientRegistry;

/// Authorization request parameters (query string or form body)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Why an authorize request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeRejection {
    /// The client or redirect URI cannot be trusted; answer the caller directly
    Direct(AuthError),
    /// Client and redirect URI are valid; report the error to the client's redirect URI
    Redirect {
        redirect_uri: String,
        state: Option<String>,
        error: AuthError,
    },
}

impl AuthorizeRejection {
    pub fn error(&self) -> &AuthError {
        match self {
            AuthorizeRejection::Direct(error) => error,
            AuthorizeRejection::Redirect { error, .. } => error,
        }
    }
}

/// Validates authorize requests against the client registry
pub struct AuthorizeValidator {
    registry: Arc<ClientRegistry>,
}

impl AuthorizeValidator {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Check an authorize request and build the transaction it would create.
    ///
    /// Client and redirect URI are checked first; nothing is redirected to an
    /// unregistered URI.
    pub fn validate(
        &self,
        params: &AuthorizeParams,
        now: DateTime<Utc>,
    ) -> Result<AuthorizeTransaction, AuthorizeRejection> {
        let client_id = non_empty(&params.client_id).ok_or_else(|| {
            AuthorizeRejection::Direct(AuthError::invalid_request("Missing client_id"))
        })?;
        let redirect_uri = non_empty(&params.redirect_uri).ok_or_else(|| {
            AuthorizeRejection::Direct(AuthError::invalid_request("Missing redirect_uri"))
        })?;

        let client = self.registry.validate(client_id, redirect_uri).map_err(|e| {
            warn!(
                client_id = %client_id,
                "[OAuth] Rejecting authorize request: {}",
                e
            );
            AuthorizeRejection::Direct(e)
        })?;

        let redirect = |error: AuthError| AuthorizeRejection::Redirect {
            redirect_uri: redirect_uri.to_string(),
            state: params.state.clone(),
            error,
        };

        match params.response_type.as_deref() {
            Some("code") => {}
            other => {
                return Err(redirect(AuthError::UnsupportedResponseType(format!(
                    "Only 'code' response type is supported (got {:?})",
                    other.unwrap_or("")
                ))));
            }
        }

        let scope = non_empty(&params.scope).map(str::to_string);
        if !client.allows_scopes(&parse_scopes(scope.as_deref())) {
            return Err(redirect(AuthError::InvalidScope(
                "Requested scope exceeds what the client is registered for".to_string(),
            )));
        }

        let tx = AuthorizeTransaction::new(client_id, redirect_uri, now)
            .with_scope(scope)
            .with_state(params.state.clone());

        match non_empty(&params.code_challenge) {
            Some(challenge) => {
                let method = ChallengeMethod::parse(params.code_challenge_method.as_deref())
                    .map_err(&redirect)?;
                debug!(client_id = %client_id, method = %method, "[OAuth] PKCE challenge bound");
                Ok(tx.with_pkce(challenge, method))
            }
            None if params.code_challenge_method.is_some() => Err(redirect(
                AuthError::invalid_request("code_challenge_method given without code_challenge"),
            )),
            None => {
                warn!(
                    client_id = %client_id,
                    "[OAuth] No PKCE challenge supplied; code exchange will skip PKCE"
                );
                Ok(tx)
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
