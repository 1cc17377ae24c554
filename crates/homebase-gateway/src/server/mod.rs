//! Gateway Server
//!
//! HTTP surface of the authorization server: the authorize / approve /
//! token flow, metadata, and authenticated resource routes.

pub mod config;
mod dependencies;
mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
mod state;
pub mod sweeper;

pub use config::{
    client_registry_from_env, upstream_config_from_env, GatewayConfig, StoreKind,
};
pub use dependencies::{DependenciesBuilder, GatewayDependencies};
pub use handlers::{ApprovalResponse, HealthResponse, OAuthServerMetadata, TransactionView};
pub use rate_limit::{FixedWindowRateLimiter, RateLimitConfig, RouteRateLimits};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::auth_middleware;

/// Homebase Gateway Server
///
/// All collaborators come in through [`GatewayDependencies`], so the same
/// server runs against HTTP upstreams in production and mocks in tests.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
    rate_limits: RouteRateLimits,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, dependencies: GatewayDependencies) -> Self {
        info!("[Gateway] Initializing with dependency injection...");

        let rate_limits =
            RouteRateLimits::new(dependencies.rate_limiter.clone(), config.rate_limits.clone())
                .trusting_forwarded_for(config.trust_forwarded_for);
        let state = AppState::new(&config, dependencies);

        info!(
            clients = state.registry.len(),
            "[Gateway] Services initialized successfully"
        );

        Self {
            config,
            state,
            rate_limits,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        // Resource routes: credential resolved in middleware, handlers extract `Authenticated`
        let authenticated = Router::new()
            .route("/api/whoami", get(handlers::whoami))
            .route(
                "/api/rows/{table}",
                get(handlers::list_rows).post(handlers::insert_row),
            )
            .route("/authorize/approve", post(handlers::approve))
            .route("/oauth/transactions/{id}", get(handlers::get_transaction))
            .route_layer(middleware::from_fn_with_state(
                self.state.resolver.clone(),
                auth_middleware,
            ));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/.well-known/oauth-authorization-server",
                get(handlers::oauth_metadata),
            )
            .route(
                "/authorize",
                get(handlers::authorize_get).post(handlers::authorize_post),
            )
            .route("/token", post(handlers::token))
            .merge(authenticated)
            .with_state(self.state.clone())
            .layer(middleware::from_fn(rate_limit::rate_limit_middleware))
            .layer(axum::Extension(self.rate_limits.clone()))
            .layer(TraceLayer::new_for_http())
            // Outermost, so every inner layer sees the TraceContext
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Run the gateway server until the listener fails
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.addr()?;

        info!("[Gateway] Starting on {}", addr);
        info!("[Gateway] Public URL: {}", self.state.base_url);
        info!(
            "[Gateway] CORS: {}",
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        let _sweeper = sweeper::spawn_sweeper(
            self.state.transactions.clone(),
            self.state.codes.clone(),
            self.rate_limits.limiter(),
            self.config.sweep_interval,
        );

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("[Gateway] Ready to accept connections");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    /// Start the server in the background
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
