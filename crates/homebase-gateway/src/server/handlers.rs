//! HTTP handlers
//!
//! Thin adapters: decode the request, call the service, map `AuthError`
//! through `ApiError`. Protocol rules live in `crate::oauth`.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use homebase_core::{AuthContext, AuthError, DataAccessPolicy};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::auth::Authenticated;
use crate::error::{oauth_error_response, ApiError};
use crate::oauth::{redirect_with, ApprovalDecision, AuthorizeParams, AuthorizeRejection, TokenRequest};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Serialize)]
pub struct OAuthServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

/// OAuth metadata endpoint (RFC 8414)
pub async fn oauth_metadata(State(state): State<AppState>) -> Json<OAuthServerMetadata> {
    let base = &state.base_url;
    Json(OAuthServerMetadata {
        issuer: base.to_string(),
        authorization_endpoint: format!("{}/authorize", base),
        token_endpoint: format!("{}/token", base),
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec!["authorization_code".to_string()],
        code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
        token_endpoint_auth_methods_supported: vec![
            "none".to_string(),
            "client_secret_post".to_string(),
        ],
        scopes_supported: state.registry.supported_scopes().into_iter().collect(),
    })
}

/// `GET /authorize`
pub async fn authorize_get(
    State(state): State<AppState>,
    params: Result<Query<AuthorizeParams>, QueryRejection>,
) -> Response {
    match params {
        Ok(Query(params)) => authorize(&state, params).await,
        Err(rejection) => malformed_authorize(rejection.body_text()),
    }
}

/// `POST /authorize` (form body)
pub async fn authorize_post(
    State(state): State<AppState>,
    params: Result<Form<AuthorizeParams>, FormRejection>,
) -> Response {
    match params {
        Ok(Form(params)) => authorize(&state, params).await,
        Err(rejection) => malformed_authorize(rejection.body_text()),
    }
}

fn malformed_authorize(detail: String) -> Response {
    warn!("[OAuth] Malformed authorize request: {}", detail);
    oauth_error_response(
        StatusCode::BAD_REQUEST,
        &AuthError::invalid_request("Malformed authorization request"),
    )
}

/// Validate, create the transaction and send the user to the approval page
async fn authorize(state: &AppState, params: AuthorizeParams) -> Response {
    let tx = match state.validator.validate(&params, state.clock.now()) {
        Ok(tx) => tx,
        Err(AuthorizeRejection::Direct(error)) => {
            warn!(
                client_id = ?params.client_id,
                "[OAuth] Authorize rejected: {}",
                error
            );
            // Never redirect to an unverified URI; answer the user agent directly
            return oauth_error_response(StatusCode::BAD_REQUEST, &error);
        }
        Err(AuthorizeRejection::Redirect {
            redirect_uri,
            state: client_state,
            error,
        }) => {
            info!(
                client_id = ?params.client_id,
                error = error.error_code(),
                "[OAuth] Authorize error returned to client"
            );
            return error_redirect(&redirect_uri, &error, client_state.as_deref());
        }
    };

    let client_id = tx.client_id.clone();
    let tx_id = match state.transactions.create(tx).await {
        Ok(id) => id,
        Err(e) => return ApiError(e).into_response(),
    };

    match redirect_with(&state.approval_url, &[("transaction_id", Some(tx_id.as_str()))]) {
        Ok(url) => {
            info!(client_id = %client_id, "[OAuth] Transaction created, redirecting to approval");
            Redirect::to(&url).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// Redirect an error to the client's registered redirect URI
fn error_redirect(redirect_uri: &str, error: &AuthError, state: Option<&str>) -> Response {
    let description = error.description();
    let params = [
        ("error", Some(error.error_code())),
        ("error_description", Some(description.as_str())),
        ("state", state),
    ];
    match redirect_with(redirect_uri, &params) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => oauth_error_response(StatusCode::BAD_REQUEST, &e),
    }
}

/// What the approval page needs to render a pending request
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction_id: String,
    pub client_id: String,
    pub client_name: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `GET /oauth/transactions/{id}`
pub async fn get_transaction(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(transaction_id): Path<String>,
) -> Response {
    let tx = match state.transactions.get(&transaction_id).await {
        Ok(Some(tx)) => tx,
        Ok(None) => {
            return oauth_error_response(
                StatusCode::NOT_FOUND,
                &AuthError::invalid_request("Unknown or expired transaction"),
            )
        }
        Err(e) => return ApiError(e).into_response(),
    };

    let client_name = state
        .registry
        .find(&tx.client_id)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| tx.client_id.clone());

    Json(TransactionView {
        transaction_id,
        client_id: tx.client_id,
        client_name,
        redirect_uri: tx.redirect_uri,
        scope: tx.scope,
        created_at: tx.created_at,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub redirect_url: String,
}

/// `POST /authorize/approve`
pub async fn approve(
    State(state): State<AppState>,
    auth: Authenticated,
    payload: Result<Json<ApprovalDecision>, JsonRejection>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let Json(decision) = payload.map_err(|rejection| {
        warn!("[OAuth] Malformed approval: {}", rejection.body_text());
        AuthError::invalid_request("Malformed approval body")
    })?;

    let redirect_url = state
        .approvals
        .decide(&auth.context, auth.token(), &decision)
        .await?;
    Ok(Json(ApprovalResponse { redirect_url }))
}

/// `POST /token` (form body)
pub async fn token(
    State(state): State<AppState>,
    payload: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match payload {
        Ok(form) => form,
        Err(rejection) => {
            warn!("[OAuth] Malformed token request: {}", rejection.body_text());
            return ApiError(AuthError::invalid_request("Malformed token request")).into_response();
        }
    };

    match state.exchange.exchange(&request).await {
        Ok(response) => (
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    #[serde(flatten)]
    pub context: AuthContext,
    pub policy: DataAccessPolicy,
}

/// `GET /api/whoami`
pub async fn whoami(auth: Authenticated) -> Json<WhoAmIResponse> {
    let policy = auth.policy();
    Json(WhoAmIResponse {
        context: auth.context,
        policy,
    })
}

/// Table names reach the row store URL path, so only plain identifiers pass
fn checked_table(table: &str) -> Result<&str, ApiError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(AuthError::invalid_request("Invalid table name").into())
    }
}

fn row_store(state: &AppState) -> Result<&crate::upstream::RowStoreClients, ApiError> {
    state
        .rows
        .as_ref()
        .ok_or_else(|| AuthError::upstream("row store not configured").into())
}

/// `GET /api/rows/{table}?column=value`
///
/// Requires `{table}:read`. Reads go through the handle the caller's
/// credential kind selects, with the owner filter applied for API keys.
pub async fn list_rows(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(table): Path<String>,
    Query(filters): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let table = checked_table(&table)?;
    auth.require_scope(&format!("{}:read", table))?;

    let policy = auth.policy();
    let store = row_store(&state)?.for_policy(&policy, auth.token());
    let filters: Vec<(&str, &str)> = filters
        .iter()
        .filter(|(column, _)| column.as_str() != "select")
        .map(|(column, value)| (column.as_str(), value.as_str()))
        .collect();

    let rows = store
        .select(table, &filters)
        .await
        .map_err(AuthError::upstream)?;

    debug!(
        subject = %auth.context.subject_id,
        client = ?policy.client,
        "[Rows] {} row(s) from {}",
        rows.len(),
        table
    );
    Ok(Json(rows))
}

/// `POST /api/rows/{table}` with one JSON object
///
/// Requires `{table}:write`.
pub async fn insert_row(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(table): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Value>>), ApiError> {
    let table = checked_table(&table)?;
    auth.require_scope(&format!("{}:write", table))?;

    let Json(row) = payload.map_err(|rejection| {
        warn!("[Rows] Malformed row: {}", rejection.body_text());
        AuthError::invalid_request("Row must be a JSON object")
    })?;

    let store = row_store(&state)?.for_policy(&auth.policy(), auth.token());
    let stored = store
        .insert(table, row)
        .await
        .map_err(AuthError::upstream)?;

    info!(
        subject = %auth.context.subject_id,
        "[Rows] Inserted into {}",
        table
    );
    Ok((StatusCode::CREATED, Json(stored)))
}
