//! # Homebase Gateway
//!
//! OAuth authorization-code flow with PKCE, bearer credential resolution
//! and data-access routing, served over axum.
//!
//! ## Modules
//!
//! - `oauth` - Client registry, transactions, the authorization-code state machine
//! - `auth` - Credential resolver, middleware and the `Authenticated` extractor
//! - `upstream` - HTTP collaborators (API key RPC, identity provider, row store)
//! - `server` - Router, handlers, config, rate limiting, request logging
//! - `error` - `AuthError` to HTTP mapping
//! - `logging` - Trace ids for request correlation

pub mod auth;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod server;
pub mod upstream;

pub use auth::{auth_middleware, Authenticated, CredentialResolver};
pub use error::{ApiError, OAuthErrorBody};
pub use server::{
    AppState, DependenciesBuilder, FixedWindowRateLimiter, GatewayConfig, GatewayDependencies,
    GatewayServer, RateLimitConfig, RouteRateLimits, StoreKind,
};
pub use upstream::{
    HttpApiKeyVerifier, HttpIdentityProvider, RowStoreClient, RowStoreClients, ScopedRowStore,
    UpstreamConfig,
};
