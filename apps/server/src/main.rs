//! `homebase` - runs the gateway with HTTP upstreams

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use homebase_core::{AuthorizationCode, AuthorizeTransaction};
use homebase_gateway::server::{client_registry_from_env, upstream_config_from_env};
use homebase_gateway::{
    DependenciesBuilder, GatewayConfig, GatewayServer, HttpApiKeyVerifier, HttpIdentityProvider,
    RowStoreClients, StoreKind,
};
use homebase_storage::{Database, SqliteStore};
use tokio::sync::Mutex;
use tracing::info;

/// Log file prefix, e.g. `homebase.2026-01-22.log`
const LOG_PREFIX: &str = "homebase";

/// Initialize tracing with console and optional file logging
///
/// - Console: colored, compact format
/// - File: daily rotation under `HOMEBASE_LOG_DIR`, when set
fn init_tracing() -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // RUST_LOG takes precedence over the defaults for our crates
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "info,homebase=debug,homebase_core=debug,homebase_gateway=debug,homebase_storage=debug,tower_http=info",
        )
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match std::env::var("HOMEBASE_LOG_DIR").ok() {
        Some(dir) if !dir.trim().is_empty() => {
            let logs_dir = PathBuf::from(dir);
            std::fs::create_dir_all(&logs_dir)
                .with_context(|| format!("Failed to create log directory {:?}", logs_dir))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(&logs_dir)
                .context("Failed to create log file appender")?;
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File layer: no colors, include more detail
            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Guard must be kept alive for the duration of the program
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing()?;

    info!("[Homebase] v{} starting", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::from_env()?;
    let registry = Arc::new(client_registry_from_env()?);

    let upstream = Arc::new(upstream_config_from_env(config.upstream_timeout)?);
    info!(upstream = %upstream.base_url, "[Homebase] Upstream configured");
    let http = upstream.http_client()?;
    let rows = RowStoreClients::new(http.clone(), upstream.clone());

    let api_keys = Arc::new(HttpApiKeyVerifier::new(
        rows.elevated(),
        upstream.verify_rpc.clone(),
        upstream.touch_rpc.clone(),
    ));
    let identity = Arc::new(HttpIdentityProvider::new(http, upstream.clone()));

    let mut builder = DependenciesBuilder::new()
        .with_registry(registry)
        .with_api_key_verifier(api_keys)
        .with_identity_provider(identity)
        .with_row_store(rows);

    match &config.store {
        StoreKind::Memory => info!("[Homebase] Using in-memory authorization store"),
        StoreKind::Sqlite(path) => {
            info!("[Homebase] Using SQLite authorization store at {:?}", path);
            let db = Arc::new(Mutex::new(Database::open(path)?));
            builder = builder
                .with_transaction_store(Arc::new(SqliteStore::<AuthorizeTransaction>::new(
                    db.clone(),
                    "transactions",
                )))
                .with_code_store(Arc::new(SqliteStore::<AuthorizationCode>::new(
                    db, "codes",
                )));
        }
    }

    let dependencies = builder.build().map_err(anyhow::Error::msg)?;
    GatewayServer::new(config, dependencies).run().await
}
