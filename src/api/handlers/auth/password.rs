//! Password hashing with Argon2id.
//!
//! Work factor: the Argon2id v19 defaults (19 MiB memory, 2 iterations, one
//! lane). Hashes are stored as PHC strings, which carry algorithm, version,
//! parameters, and salt alongside the digest — the cost can be raised later
//! while previously stored hashes keep verifying. Plaintext passwords never
//! leave this module and are never logged.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub(crate) fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored PHC hash.
///
/// The digest comparison inside `verify_password` is constant-time; a
/// mismatch takes as long as a match regardless of where the bytes differ.
/// Unparseable stored hashes verify as false rather than erroring out.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
