//! Domain entities and value objects
//!
//! - Registered clients (static, loaded at startup)
//! - Authorize transactions and authorization codes (the code-flow state)
//! - Credentials and the per-request `AuthContext`

mod authorization_code;
mod client;
mod credential;
mod transaction;

pub use authorization_code::*;
pub use client::*;
pub use credential::*;
pub use transaction::*;
