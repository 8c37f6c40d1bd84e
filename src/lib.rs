//! # Tradelog (Trade Journal API)
//!
//! `tradelog` is a trade-journal service: users register, log in, and manage
//! portfolios and trades behind an authenticated API.
//!
//! ## Authentication
//!
//! Login exchanges a password for a stateless bearer token (PASETO
//! `v4.local`) carrying the account id and an absolute expiry. Passwords are
//! stored as salted Argon2id PHC hashes. Authorization escalates in strict
//! order — authenticated, active, administrator — and handlers request
//! exactly the gate they need. The first account ever registered administers
//! the instance.
//!
//! ## Request integrity (CSRF)
//!
//! State-changing requests pass a double-submit-cookie check before any
//! business logic runs: the same signed token must arrive in the
//! `csrf_token` cookie and the `X-CSRF-Token` header, and it must be younger
//! than the configured max age. Every successful response rotates the token.
//! Login, registration, and the documentation/static roots are exempt;
//! login and registration still seed a fresh token on success.
//!
//! ## Configuration
//!
//! All configuration comes from CLI flags or `TRADELOG_*` environment
//! variables, is validated once at startup, and is immutable afterwards.
//! A missing or empty signing secret refuses to start.

pub mod api;
pub mod cli;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
