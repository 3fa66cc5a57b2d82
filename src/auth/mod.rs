//! Identity verification for privileged session operations.
//!
//! Authentication flows (signup, login, refresh) live in an external
//! service; this module only validates the credentials it issues.

pub mod jwt;

pub use jwt::{Identity, issue_host_token, verify_credential};
