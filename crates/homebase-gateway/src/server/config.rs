//! Gateway configuration
//!
//! Every setting has a default; `from_env` overrides them from `HOMEBASE_*`
//! variables. The binary loads `.env` before calling it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use homebase_core::CodeLifetime;

use super::rate_limit::{default_rate_limit_rules, RateLimitConfig};
use crate::oauth::ClientRegistry;
use crate::upstream::UpstreamConfig;

/// Where transactions and codes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// Process memory; lost on restart
    Memory,
    /// SQLite file; survives a restart of a single instance
    Sqlite(PathBuf),
}

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL; derived from host and port when unset
    pub public_url: Option<String>,
    /// Approval page the authorize endpoint redirects to
    pub approval_url: String,
    /// Enable CORS for browser access
    pub enable_cors: bool,
    pub transaction_ttl: chrono::Duration,
    pub code_lifetime: CodeLifetime,
    /// Bound on every collaborator call
    pub upstream_timeout: Duration,
    /// Background sweep interval; zero disables sweeping
    pub sweep_interval: Duration,
    /// Per-route limits, matched on exact path
    pub rate_limits: Vec<(String, RateLimitConfig)>,
    /// Key rate limits on `X-Forwarded-For`; enable only behind a proxy that sets it
    pub trust_forwarded_for: bool,
    pub store: StoreKind,
}

pub const DEFAULT_PORT: u16 = 8787;

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            approval_url: format!("http://localhost:{}/approve", DEFAULT_PORT),
            enable_cors: false,
            transaction_ttl: chrono::Duration::minutes(10),
            code_lifetime: CodeLifetime::default(),
            upstream_timeout: crate::upstream::DEFAULT_UPSTREAM_TIMEOUT,
            sweep_interval: Duration::from_secs(60),
            rate_limits: default_rate_limit_rules(),
            trust_forwarded_for: false,
            store: StoreKind::Memory,
        }
    }
}

impl GatewayConfig {
    /// Load from `HOMEBASE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_string("HOMEBASE_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse::<u16>("HOMEBASE_PORT")? {
            config.port = port;
        }
        config.public_url = env_string("HOMEBASE_PUBLIC_URL");
        config.approval_url = env_string("HOMEBASE_APPROVAL_URL")
            .unwrap_or_else(|| format!("{}/approve", config.base_url()));
        if let Some(cors) = env_parse::<bool>("HOMEBASE_ENABLE_CORS")? {
            config.enable_cors = cors;
        }
        if let Some(trust) = env_parse::<bool>("HOMEBASE_TRUST_FORWARDED_FOR")? {
            config.trust_forwarded_for = trust;
        }
        if let Some(secs) = env_parse::<i64>("HOMEBASE_TRANSACTION_TTL_SECS")? {
            config.transaction_ttl = lifetime_secs("HOMEBASE_TRANSACTION_TTL_SECS", secs)?;
        }
        if let Some(secs) = env_parse::<i64>("HOMEBASE_CODE_TTL_SECS")? {
            config.code_lifetime.ttl = lifetime_secs("HOMEBASE_CODE_TTL_SECS", secs)?;
        }
        if let Some(secs) = env_parse::<i64>("HOMEBASE_CODE_GRACE_SECS")? {
            config.code_lifetime.grace = lifetime_secs("HOMEBASE_CODE_GRACE_SECS", secs)?;
        }
        if config.code_lifetime.grace > config.code_lifetime.ttl {
            bail!("HOMEBASE_CODE_GRACE_SECS must not exceed HOMEBASE_CODE_TTL_SECS");
        }
        if let Some(ms) = env_parse::<u64>("HOMEBASE_UPSTREAM_TIMEOUT_MS")? {
            config.upstream_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("HOMEBASE_SWEEP_INTERVAL_SECS")? {
            config.sweep_interval = Duration::from_secs(secs);
        }

        config.store = match env_string("HOMEBASE_STORE").as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("sqlite") => {
                let path = match env_string("HOMEBASE_DB_PATH") {
                    Some(path) => PathBuf::from(path),
                    None => homebase_storage::default_database_path()
                        .context("No data directory; set HOMEBASE_DB_PATH")?,
                };
                StoreKind::Sqlite(path)
            }
            Some(other) => bail!("Unknown HOMEBASE_STORE '{}' (expected memory or sqlite)", other),
        };

        Ok(config)
    }

    /// Get the socket address
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Public base URL, without trailing slash
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Upstream settings from `HOMEBASE_UPSTREAM_URL`, `HOMEBASE_ANON_KEY` and
/// `HOMEBASE_SERVICE_KEY`
pub fn upstream_config_from_env(timeout: Duration) -> Result<UpstreamConfig> {
    let base_url = env_required("HOMEBASE_UPSTREAM_URL")?;
    let anon_key = env_required("HOMEBASE_ANON_KEY")?;
    let service_key = env_required("HOMEBASE_SERVICE_KEY")?;

    let mut config = UpstreamConfig::new(base_url, anon_key, service_key).with_timeout(timeout);
    if let Some(verify) = env_string("HOMEBASE_VERIFY_RPC") {
        config.verify_rpc = verify;
    }
    if let Some(touch) = env_string("HOMEBASE_TOUCH_RPC") {
        config.touch_rpc = touch;
    }
    Ok(config)
}

/// Client registry from `HOMEBASE_CLIENTS_FILE`, falling back to inline
/// `HOMEBASE_CLIENTS` JSON
pub fn client_registry_from_env() -> Result<ClientRegistry> {
    if let Some(path) = env_string("HOMEBASE_CLIENTS_FILE") {
        return ClientRegistry::from_file(&PathBuf::from(path));
    }
    if let Some(json) = env_string("HOMEBASE_CLIENTS") {
        return ClientRegistry::from_json(&json);
    }
    bail!("No clients configured: set HOMEBASE_CLIENTS_FILE or HOMEBASE_CLIENTS")
}

/// Longest TTL or grace window accepted from the environment (one day)
const MAX_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// A TTL or grace window in seconds; must be positive and at most a day
fn lifetime_secs(name: &str, secs: i64) -> Result<chrono::Duration> {
    if secs <= 0 || secs > MAX_LIFETIME_SECS {
        bail!(
            "{} must be between 1 and {} seconds (got {})",
            name,
            MAX_LIFETIME_SECS,
            secs
        );
    }
    Ok(chrono::Duration::seconds(secs))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_required(name: &str) -> Result<String> {
    env_string(name).with_context(|| format!("{} is not set", name))
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", name, raw, e)),
    }
}
