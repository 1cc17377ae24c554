//! Authentication for resource routes
//!
//! `auth_middleware` resolves the bearer credential once per request and
//! stores the result as an [`Authenticated`] extension. Handlers take
//! `Authenticated` as an extractor and never look at the header themselves.

mod resolver;

pub use resolver::CredentialResolver;

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use homebase_core::{AuthContext, AuthError, AuthResult, Credential, DataAccessPolicy};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::logging::{ResolvedSubject, TraceContext};

/// Resolved caller for the current request
#[derive(Clone)]
pub struct Authenticated {
    pub context: AuthContext,
    credential: Arc<Credential>,
}

impl Authenticated {
    pub fn new(context: AuthContext, credential: Credential) -> Self {
        Self {
            context,
            credential: Arc::new(credential),
        }
    }

    /// The raw credential, for forwarding to the identity-scoped store client
    pub fn token(&self) -> &str {
        self.credential.secret()
    }

    pub fn policy(&self) -> DataAccessPolicy {
        DataAccessPolicy::select(&self.context)
    }

    pub fn require_scope(&self, scope: &str) -> AuthResult<()> {
        self.context.require_scope(scope)
    }
}

impl std::fmt::Debug for Authenticated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticated")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or(ApiError(AuthError::Unauthenticated))
    }
}

/// Resolve `Authorization: Bearer …` and attach [`Authenticated`], or answer 401
pub async fn auth_middleware(
    State(resolver): State<Arc<CredentialResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone())
        .unwrap_or_else(|| "------".to_string());

    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(credential) = Credential::from_authorization_header(header) else {
        debug!(trace_id = %trace_id, "[Auth] Missing or malformed bearer credential");
        return ApiError(AuthError::Unauthenticated).into_response();
    };

    let kind = credential.kind();
    let Some(context) = resolver.resolve(&credential).await else {
        warn!(trace_id = %trace_id, kind = ?kind, "[Auth] Credential did not resolve");
        return ApiError(AuthError::Unauthenticated).into_response();
    };

    debug!(
        trace_id = %trace_id,
        subject = %context.subject_id,
        kind = ?kind,
        "[Auth] Authenticated"
    );

    let subject = ResolvedSubject(context.subject_id.clone());
    request
        .extensions_mut()
        .insert(Authenticated::new(context, credential));

    let mut response = next.run(request).await;
    response.extensions_mut().insert(subject);
    response
}
