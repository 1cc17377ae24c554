//! Per-caller rate limiting for the OAuth endpoints.
//!
//! Fixed windows tracked in a DashMap, keyed by `"{ip}:{route}"`. The caller
//! IP comes from the connection. The first `X-Forwarded-For` hop is used
//! only when the gateway is configured to trust its proxy; otherwise any
//! client could pick its own bucket by rewriting the header.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use homebase_core::{AuthError, RateLimiter};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Configuration for a rate-limited route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the window.
    pub max_requests: u32,
    /// Time window duration.
    pub window: Duration,
}

/// Bucket count above which ended windows are dropped before a new key is added
const DEFAULT_MAX_BUCKETS: usize = 10_000;

struct Bucket {
    window_start: Instant,
    count: u32,
    window: Duration,
}

/// In-memory fixed-window limiter
pub struct FixedWindowRateLimiter {
    buckets: DashMap<String, Bucket>,
    max_buckets: usize,
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::with_max_buckets(DEFAULT_MAX_BUCKETS)
    }
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_buckets(max_buckets: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            max_buckets,
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn is_limited(&self, key: &str, window: Duration, max_requests: u32) -> bool {
        // No entry guard may be held while retain() runs
        if self.buckets.len() >= self.max_buckets && !self.buckets.contains_key(key) {
            let evicted = self.evict_expired();
            debug!(evicted, "[RateLimit] Bucket cap reached, dropped ended windows");
        }

        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            window_start: Instant::now(),
            count: 0,
            window,
        });
        let Bucket {
            window_start,
            count,
            window: bucket_window,
        } = entry.value_mut();
        *bucket_window = window;

        if window_start.elapsed() >= window {
            *window_start = Instant::now();
            *count = 1;
            return false;
        }

        if *count >= max_requests {
            return true;
        }

        *count += 1;
        false
    }

    fn evict_expired(&self) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.window_start.elapsed() < bucket.window);
        before.saturating_sub(self.buckets.len())
    }
}

/// Route rules plus the limiter they count against (clone-friendly via Arc).
#[derive(Clone)]
pub struct RouteRateLimits {
    limiter: Arc<dyn RateLimiter>,
    rules: Arc<Vec<(String, RateLimitConfig)>>,
    trust_forwarded_for: bool,
}

impl RouteRateLimits {
    pub fn new(limiter: Arc<dyn RateLimiter>, rules: Vec<(String, RateLimitConfig)>) -> Self {
        Self {
            limiter,
            rules: Arc::new(rules),
            trust_forwarded_for: false,
        }
    }

    /// Key callers on `X-Forwarded-For`. Only for deployments behind a proxy
    /// that overwrites the header.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn limiter(&self) -> Arc<dyn RateLimiter> {
        self.limiter.clone()
    }

    /// `true` if this caller has used up the route's window
    pub fn is_limited(&self, caller: &str, path: &str) -> bool {
        match self.rules.iter().find(|(route, _)| route == path) {
            Some((route, config)) => self.limiter.is_limited(
                &format!("{}:{}", caller, route),
                config.window,
                config.max_requests,
            ),
            None => false,
        }
    }
}

/// Caller address for rate limiting
fn caller_ip(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware function for rate limiting.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limits = request.extensions().get::<RouteRateLimits>().cloned();

    if let Some(limits) = limits {
        let caller = caller_ip(&request, limits.trust_forwarded_for);
        let path = request.uri().path().to_string();
        if limits.is_limited(&caller, &path) {
            warn!(caller = %caller, path = %path, "[RateLimit] Request rejected");
            return ApiError(AuthError::RateLimited).into_response();
        }
    }

    next.run(request).await
}

/// Default rules: 30/min on `/authorize`, 60/min on `/token`.
pub fn default_rate_limit_rules() -> Vec<(String, RateLimitConfig)> {
    vec![
        (
            "/authorize".to_string(),
            RateLimitConfig {
                max_requests: 30,
                window: Duration::from_secs(60),
            },
        ),
        (
            "/token".to_string(),
            RateLimitConfig {
                max_requests: 60,
                window: Duration::from_secs(60),
            },
        ),
    ]
}
