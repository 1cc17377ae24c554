//! Data-access policy selection
//!
//! Decides, per credential kind, which database client a request must use
//! and how row ownership is attributed.
//!
//! The two mistakes this prevents are not symmetric. An API-key request sent
//! through the identity-scoped client sees no rows (fails safe). A bearer
//! request sent through the elevated client without an owner filter sees
//! every owner's rows (fails dangerous). Always route through
//! [`DataAccessPolicy::select`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{AuthContext, CredentialKind};

/// Column carrying row ownership
pub const OWNER_COLUMN: &str = "owner_id";

/// Which database handle to use
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataClientKind {
    /// Service-level client; bypasses row-level policy
    Elevated,
    /// Client acting as the caller; row-level policy applies
    IdentityScoped,
}

/// How ownership is enforced on outgoing queries
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OwnerAttribution {
    /// Every write sets the owner column and every read filters on it
    Explicit { owner_id: String },
    /// The store's row-level policy enforces ownership
    RowLevelPolicy,
}

/// Client choice plus ownership rule for one request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DataAccessPolicy {
    pub client: DataClientKind,
    pub attribution: OwnerAttribution,
}

impl DataAccessPolicy {
    /// Select the policy for a resolved context
    pub fn select(ctx: &AuthContext) -> Self {
        match ctx.credential_kind {
            CredentialKind::ApiKey => Self {
                client: DataClientKind::Elevated,
                attribution: OwnerAttribution::Explicit {
                    owner_id: ctx.subject_id.clone(),
                },
            },
            CredentialKind::BearerAssertion => Self {
                client: DataClientKind::IdentityScoped,
                attribution: OwnerAttribution::RowLevelPolicy,
            },
        }
    }

    /// Apply ownership to a row about to be written.
    ///
    /// Under explicit attribution any caller-supplied owner is overwritten.
    pub fn attribute_write(&self, row: &mut Map<String, Value>) {
        if let OwnerAttribution::Explicit { owner_id } = &self.attribution {
            row.insert(OWNER_COLUMN.to_string(), Value::String(owner_id.clone()));
        }
    }

    /// Owner filter a read must carry, if any
    pub fn owner_filter(&self) -> Option<(&'static str, &str)> {
        match &self.attribution {
            OwnerAttribution::Explicit { owner_id } => Some((OWNER_COLUMN, owner_id.as_str())),
            OwnerAttribution::RowLevelPolicy => None,
        }
    }
}
