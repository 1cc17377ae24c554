//! Authorization Code flow with PKCE
//!
//! - `registry` - static table of registered clients
//! - `transactions` - in-flight authorize requests awaiting approval
//! - `codes` - the authorization-code state machine
//! - `authorize` / `approval` / `exchange` - the three protocol steps

mod approval;
mod authorize;
mod codes;
mod exchange;
mod registry;
mod transactions;

pub use approval::{ApprovalDecision, ApprovalService};
pub use authorize::{AuthorizeParams, AuthorizeRejection, AuthorizeValidator};
pub use codes::{AuthorizationCodeService, CodeStore, ConsumedCode};
pub use exchange::{TokenExchange, TokenRequest};
pub use registry::ClientRegistry;
pub use transactions::{TransactionService, TransactionStore};

use homebase_core::{AuthError, AuthResult};
use rand::RngCore;

/// Prefix on every issued authorization code
pub const AUTHORIZATION_CODE_PREFIX: &str = "hbc_";

/// Generate a fresh authorization code: `hbc_` followed by 32 hex chars
pub fn generate_authorization_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", AUTHORIZATION_CODE_PREFIX, hex::encode(bytes))
}

/// Generate an opaque transaction id
pub fn generate_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Append query parameters to a registered redirect URI.
///
/// Absent values are skipped; existing query parameters are kept.
pub fn redirect_with(redirect_uri: &str, params: &[(&str, Option<&str>)]) -> AuthResult<String> {
    let mut url = url::Url::parse(redirect_uri)
        .map_err(|e| AuthError::invalid_request(format!("Invalid redirect_uri: {}", e)))?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }
    Ok(url.into())
}

/// First characters of a secret-ish value, for logs
pub(crate) fn short(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(12)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    &value[..end]
}
