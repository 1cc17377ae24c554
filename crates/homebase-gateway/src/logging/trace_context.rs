//! Trace Context - request correlation and entry/exit logging

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, info_span, Span};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Short, unique trace id: 6 hex characters (e.g. "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mixed = counter.wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Correlation data for a single request
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Caller resolved by the auth middleware, attached to the response for the exit log
#[derive(Debug, Clone)]
pub struct ResolvedSubject(pub String);

/// Short subject id for logging (first 8 chars or "anon")
pub fn short_subject(subject: Option<&str>) -> &str {
    subject
        .map(|s| s.char_indices().nth(8).map_or(s, |(idx, _)| &s[..idx]))
        .unwrap_or("anon")
}

pub struct RequestSpan;

impl RequestSpan {
    /// Span carrying trace_id into every child log line
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    pub fn log_entry(ctx: &TraceContext) {
        info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path);
    }

    pub fn log_exit(ctx: &TraceContext, status: u16, subject: Option<&str>) {
        info!(
            trace_id = %ctx.trace_id,
            "← {} subject={} ({}ms)",
            status,
            short_subject(subject),
            ctx.elapsed_ms()
        );
    }
}
