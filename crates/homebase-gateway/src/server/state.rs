//! Shared handler state
//!
//! Built once from the config and injected dependencies. Every service is
//! behind an `Arc`, so cloning the state per request is cheap.

use std::sync::Arc;

use axum::extract::FromRef;
use homebase_core::SharedClock;

use super::config::GatewayConfig;
use super::dependencies::GatewayDependencies;
use crate::auth::CredentialResolver;
use crate::oauth::{
    ApprovalService, AuthorizationCodeService, AuthorizeValidator, ClientRegistry, TokenExchange,
    TransactionService,
};
use crate::upstream::RowStoreClients;

#[derive(Clone)]
pub struct AppState {
    pub base_url: String,
    pub approval_url: String,
    pub registry: Arc<ClientRegistry>,
    pub validator: Arc<AuthorizeValidator>,
    pub transactions: Arc<TransactionService>,
    pub codes: Arc<AuthorizationCodeService>,
    pub approvals: Arc<ApprovalService>,
    pub exchange: Arc<TokenExchange>,
    pub resolver: Arc<CredentialResolver>,
    pub rows: Option<RowStoreClients>,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(config: &GatewayConfig, deps: GatewayDependencies) -> Self {
        let transactions = Arc::new(TransactionService::new(
            deps.transaction_store,
            deps.clock.clone(),
            config.transaction_ttl,
        ));
        let codes = Arc::new(AuthorizationCodeService::new(
            deps.code_store,
            deps.clock.clone(),
            config.code_lifetime,
        ));
        let resolver = Arc::new(CredentialResolver::new(
            deps.api_keys,
            deps.identity,
            deps.clock.clone(),
            config.upstream_timeout,
        ));

        Self {
            base_url: config.base_url(),
            approval_url: config.approval_url.clone(),
            validator: Arc::new(AuthorizeValidator::new(deps.registry.clone())),
            approvals: Arc::new(ApprovalService::new(transactions.clone(), codes.clone())),
            exchange: Arc::new(TokenExchange::new(deps.registry.clone(), codes.clone())),
            registry: deps.registry,
            transactions,
            codes,
            resolver,
            rows: deps.row_store,
            clock: deps.clock,
        }
    }
}

impl FromRef<AppState> for Arc<CredentialResolver> {
    fn from_ref(state: &AppState) -> Self {
        state.resolver.clone()
    }
}
