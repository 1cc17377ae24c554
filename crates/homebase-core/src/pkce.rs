//! PKCE (Proof Key for Code Exchange)
//!
//! Implements the verifier side of RFC 7636.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::domain::AuthorizationCode;
use crate::error::{AuthError, AuthResult};

/// Code challenge transformation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChallengeMethod {
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl ChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeMethod::S256 => "S256",
            ChallengeMethod::Plain => "plain",
        }
    }

    /// Parse an optional `code_challenge_method` parameter.
    ///
    /// Absent defaults to `plain` (RFC 7636 §4.3). Unknown values are rejected.
    pub fn parse(method: Option<&str>) -> AuthResult<Self> {
        match method {
            None => Ok(ChallengeMethod::Plain),
            Some("S256") => Ok(ChallengeMethod::S256),
            Some("plain") => Ok(ChallengeMethod::Plain),
            Some(other) => Err(AuthError::invalid_request(format!(
                "Unsupported code_challenge_method: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The challenge a verifier must produce under `method`
pub fn challenge_of(verifier: &str, method: ChallengeMethod) -> String {
    match method {
        ChallengeMethod::S256 => {
            let mut hasher = Sha256::new();
            hasher.update(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hasher.finalize())
        }
        ChallengeMethod::Plain => verifier.to_string(),
    }
}

/// Outcome of a successful PKCE check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceCheck {
    /// The presented verifier matched the stored challenge
    Verified,
    /// The code was issued without a challenge; PKCE was not applied
    NotRequired,
}

/// Check a presented verifier against the challenge bound to `code`.
///
/// Read-only: never modifies the stored challenge.
pub fn verify_code(code: &AuthorizationCode, presented: Option<&str>) -> AuthResult<PkceCheck> {
    let Some(challenge) = code.code_challenge.as_deref() else {
        return Ok(PkceCheck::NotRequired);
    };

    let Some(verifier) = presented else {
        return Err(AuthError::invalid_grant("Missing code_verifier"));
    };

    let method = code.code_challenge_method.unwrap_or(ChallengeMethod::Plain);
    let computed = challenge_of(verifier, method);

    if bool::from(computed.as_bytes().ct_eq(challenge.as_bytes())) {
        Ok(PkceCheck::Verified)
    } else {
        Err(AuthError::invalid_grant("PKCE verification failed"))
    }
}
