//! HTTP mapping for `AuthError`

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use homebase_core::AuthError;
use serde::{Deserialize, Serialize};

/// Realm advertised in `WWW-Authenticate`
pub const AUTH_REALM: &str = "homebase";

/// OAuth-style error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&AuthError> for OAuthErrorBody {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: Some(err.description()),
        }
    }
}

/// `AuthError` as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AuthError::Unauthenticated | AuthError::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientScope(_) | AuthError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InvalidGrant(_)
            | AuthError::InvalidRequest(_)
            | AuthError::InvalidScope(_)
            | AuthError::UnsupportedGrantType(_)
            | AuthError::UnsupportedResponseType(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let AuthError::UpstreamUnavailable(detail) = &self.0 {
            tracing::error!("[Gateway] Upstream unavailable: {}", detail);
        }
        oauth_error_response(self.status(), &self.0)
    }
}

/// Error body with the given status.
///
/// 401 and 403 responses carry a `WWW-Authenticate: Bearer` challenge.
pub fn oauth_error_response(status: StatusCode, err: &AuthError) -> Response {
    let challenge = match err {
        AuthError::Unauthenticated => Some(format!(
            r#"Bearer realm="{}", error="invalid_token""#,
            AUTH_REALM
        )),
        AuthError::InsufficientScope(scope) => Some(format!(
            r#"Bearer realm="{}", error="insufficient_scope", scope="{}""#,
            AUTH_REALM, scope
        )),
        _ => None,
    };

    let mut response = (status, Json(OAuthErrorBody::from(err))).into_response();
    if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
