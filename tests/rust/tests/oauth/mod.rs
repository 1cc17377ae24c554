//! OAuth integration tests
//!
//! Authorization code flow across the transaction, approval, code and
//! exchange services, driven by a manual clock.

mod codes;
