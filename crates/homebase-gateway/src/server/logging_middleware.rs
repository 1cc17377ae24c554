//! HTTP Request/Response Logging Middleware
//!
//! One entry and one exit line per request, correlated by trace id. Bodies
//! are logged at DEBUG, except on paths that carry credentials. Only bodies
//! whose declared length fits `MAX_BODY_LOG_SIZE` are buffered; anything
//! larger or unsized streams through unlogged.

use axum::{
    body::{Body, HttpBody},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, ResolvedSubject, TraceContext};

/// Maximum body size to log
const MAX_BODY_LOG_SIZE: usize = 4 * 1024;

/// Paths whose request and response bodies carry codes, verifiers or tokens
const SENSITIVE_PATHS: &[&str] = &["/token", "/authorize/approve"];

/// Headers that should be redacted
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Check if a path carries credentials in its bodies
pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.ends_with(p))
}

/// Compact header summary for DEBUG, with credentials redacted
fn redact_headers_compact(headers: &axum::http::HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| {
            matches!(
                name.as_str(),
                "content-type"
                    | "accept"
                    | "user-agent"
                    | "x-forwarded-for"
                    | "authorization"
                    | "cookie"
                    | "x-api-key"
            )
        })
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a body is small enough to buffer for logging
fn fits_log_limit(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_BODY_LOG_SIZE as u64)
}

/// Format bytes as string - compact version
pub fn format_body(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "[empty]".to_string();
    }

    if bytes.len() > MAX_BODY_LOG_SIZE {
        return format!("[{} bytes]", bytes.len());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
                return serde_json::to_string(&json).unwrap_or_else(|_| text.to_string());
            }
            match text.char_indices().nth(200) {
                Some((idx, _)) => format!("{}...", &text[..idx]),
                None => text.to_string(),
            }
        }
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

/// Logging middleware for requests and responses
///
/// Creates the request's `TraceContext`, stores it in the request extensions
/// for downstream middleware, and logs entry and exit. The exit line carries
/// the subject the auth middleware resolved, if any.
pub async fn http_logging_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let is_sensitive = is_sensitive_path(&path);

    let ctx = TraceContext::new(&method, &path);
    let span = RequestSpan::enter(&ctx);

    async move {
        RequestSpan::log_entry(&ctx);
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(request.headers()),
            "Request headers"
        );

        let (mut parts, body) = request.into_parts();
        parts.extensions.insert(ctx.clone());

        let request = if is_sensitive || !fits_log_limit(&body) {
            Request::from_parts(parts, body)
        } else {
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                    return Err(StatusCode::BAD_REQUEST);
                }
            };
            if !body_bytes.is_empty() {
                debug!(
                    trace_id = %ctx.trace_id,
                    body = %format_body(&body_bytes),
                    "Request body"
                );
            }
            Request::from_parts(parts, Body::from(body_bytes))
        };

        let response = next.run(request).await;
        let status = response.status().as_u16();
        let subject = response
            .extensions()
            .get::<ResolvedSubject>()
            .map(|s| s.0.clone());

        let response = if is_sensitive || !fits_log_limit(response.body()) {
            response
        } else {
            let (parts, body) = response.into_parts();
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                    return Err(StatusCode::INTERNAL_SERVER_ERROR);
                }
            };
            if !body_bytes.is_empty() {
                debug!(
                    trace_id = %ctx.trace_id,
                    body = %format_body(&body_bytes),
                    "Response body"
                );
            }
            Response::from_parts(parts, Body::from(body_bytes))
        };

        RequestSpan::log_exit(&ctx, status, subject.as_deref());
        Ok(response)
    }
    .instrument(span)
    .await
}
