//! # Homebase Core Library
//!
//! Domain logic for the Homebase credential and authorization-code core.
//!
//! ## Modules
//!
//! - `domain` - Entities (RegisteredClient, AuthorizeTransaction, AuthorizationCode, AuthContext)
//! - `error` - The `AuthError` taxonomy shared by every layer
//! - `pkce` - Proof Key for Code Exchange verification
//! - `policy` - Data-access policy selection per credential kind
//! - `clock` - Injectable time source for TTL and grace-window checks
//! - `repository` - Store and collaborator traits

pub mod clock;
pub mod domain;
pub mod error;
pub mod pkce;
pub mod policy;
pub mod repository;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use domain::*;
pub use error::{AuthError, AuthResult};
pub use pkce::PkceCheck;
pub use policy::{DataAccessPolicy, DataClientKind, OwnerAttribution, OWNER_COLUMN};
pub use repository::*;
