//! Error taxonomy for credential resolution and the authorization-code flow

use thiserror::Error;

/// Result alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced by the auth core.
///
/// Variants map one-to-one onto OAuth error codes (see [`AuthError::error_code`]).
/// `Unauthenticated` deliberately carries no detail so callers cannot
/// distinguish an unknown credential from an expired one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential, or one that could not be resolved
    #[error("authentication required")]
    Unauthenticated,

    /// Unknown client_id, disallowed redirect_uri or bad client secret
    #[error("invalid client: {0}")]
    InvalidClient(String),

    /// Code unknown, expired, reused past grace, or PKCE mismatch
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Malformed or incomplete request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested scope exceeds what the client is registered for
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Credential lacks a scope the endpoint requires
    #[error("insufficient scope: {0} required")]
    InsufficientScope(String),

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// The resource owner refused, or the credential kind may not perform this action
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("rate limit exceeded")]
    RateLimited,

    /// A verification or store dependency is unreachable
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AuthError {
    /// OAuth 2.0 error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "invalid_token",
            AuthError::InvalidClient(_) => "invalid_client",
            AuthError::InvalidGrant(_) => "invalid_grant",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::InvalidScope(_) => "invalid_scope",
            AuthError::InsufficientScope(_) => "insufficient_scope",
            AuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            AuthError::AccessDenied(_) => "access_denied",
            AuthError::RateLimited => "rate_limited",
            AuthError::UpstreamUnavailable(_) => "temporarily_unavailable",
        }
    }

    /// Human-readable description safe to return to callers
    pub fn description(&self) -> String {
        match self {
            AuthError::Unauthenticated => "Missing or invalid credentials".to_string(),
            AuthError::RateLimited => "Rate limit exceeded. Please try again later.".to_string(),
            AuthError::UpstreamUnavailable(_) => {
                "A required service is temporarily unavailable".to_string()
            }
            AuthError::InvalidClient(d)
            | AuthError::InvalidGrant(d)
            | AuthError::InvalidRequest(d)
            | AuthError::InvalidScope(d)
            | AuthError::UnsupportedGrantType(d)
            | AuthError::UnsupportedResponseType(d)
            | AuthError::AccessDenied(d) => d.clone(),
            AuthError::InsufficientScope(scope) => format!("Scope '{}' is required", scope),
        }
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        AuthError::InvalidGrant(description.into())
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        AuthError::InvalidClient(description.into())
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        AuthError::InvalidRequest(description.into())
    }

    /// Wrap an infrastructure failure
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        AuthError::UpstreamUnavailable(err.to_string())
    }
}
