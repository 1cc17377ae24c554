//! Approval step - the resource owner approves or denies a pending transaction

use std::sync::Arc;

use homebase_core::{AuthContext, AuthError, AuthResult, CredentialKind, TokenMaterial};
use serde::Deserialize;
use tracing::info;

use super::{redirect_with, short, AuthorizationCodeService, TransactionService};

/// Approval page submission
#[derive(Clone, Deserialize)]
pub struct ApprovalDecision {
    pub transaction_id: String,
    pub approved: bool,
    /// Refresh token to hand to the client alongside the approver's access token
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalDecision")
            .field("transaction_id", &self.transaction_id)
            .field("approved", &self.approved)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

pub struct ApprovalService {
    transactions: Arc<TransactionService>,
    codes: Arc<AuthorizationCodeService>,
}

impl ApprovalService {
    pub fn new(transactions: Arc<TransactionService>, codes: Arc<AuthorizationCodeService>) -> Self {
        Self {
            transactions,
            codes,
        }
    }

    /// Resolve a pending transaction and return the client redirect URL.
    ///
    /// The transaction is taken atomically, so it can be decided only once.
    /// On approval the approver's own access token becomes the token material
    /// bound to the issued code.
    pub async fn decide(
        &self,
        approver: &AuthContext,
        access_token: &str,
        decision: &ApprovalDecision,
    ) -> AuthResult<String> {
        match approver.credential_kind {
            CredentialKind::BearerAssertion => {}
            CredentialKind::ApiKey => {
                return Err(AuthError::AccessDenied(
                    "API keys cannot approve authorization requests".to_string(),
                ));
            }
        }

        let tx = self
            .transactions
            .take(&decision.transaction_id)
            .await?
            .ok_or_else(|| {
                AuthError::invalid_request("Authorization request not found or expired")
            })?;

        if !decision.approved {
            info!(
                client_id = %tx.client_id,
                "[OAuth] User denied transaction {}",
                short(&decision.transaction_id)
            );
            return redirect_with(
                &tx.redirect_uri,
                &[
                    ("error", Some("access_denied")),
                    ("error_description", Some("User denied the request")),
                    ("state", tx.state.as_deref()),
                ],
            );
        }

        let tokens = TokenMaterial {
            access_token: access_token.to_string(),
            refresh_token: decision.refresh_token.clone(),
            expires_in: decision.expires_in,
        };
        let code = self.codes.issue(&tx, &approver.subject_id, tokens).await?;

        info!(
            client_id = %tx.client_id,
            "[OAuth] User approved transaction {}",
            short(&decision.transaction_id)
        );

        redirect_with(
            &tx.redirect_uri,
            &[("code", Some(code.as_str())), ("state", tx.state.as_deref())],
        )
    }
}
