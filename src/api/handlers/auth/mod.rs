//! Authentication and authorization.
//!
//! This module owns the security core of the service:
//!
//! - password-credential verification ([`password`]),
//! - bearer-token issuance at login and verification on every request
//!   (backed by [`crate::token`]),
//! - the escalating authorization chain — authenticated, active,
//!   administrator ([`principal`]).
//!
//! The CSRF double-submit guard lives in [`crate::api::csrf`] and runs as
//! middleware before any of the handlers here.

pub(crate) mod login;
pub(crate) mod me;
mod password;
pub(crate) mod principal;
pub(crate) mod register;
mod state;
pub(crate) mod storage;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
