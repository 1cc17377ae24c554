//! Request correlation for structured logs
//!
//! Every HTTP request gets a short trace id; all log lines emitted while it
//! is handled carry that id.

mod trace_context;

pub use trace_context::{
    generate_trace_id, short_subject, RequestSpan, ResolvedSubject, TraceContext,
};
