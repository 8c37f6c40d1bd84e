//! Signed, expiring tokens for bearer auth and the CSRF double-submit pair.
//!
//! Both token kinds are PASETO `v4.local` strings sealed with a key derived
//! from the process-wide signing secret. Claim validation is done by this
//! module against an explicit clock so expiry behavior is testable; callers
//! outside the crate only ever see the public `issue`/`verify` pair that uses
//! the current time.
//!
//! Verification failures carry a typed [`Error`] for server-side diagnostics,
//! but the HTTP boundary collapses all of them into a single
//! "unauthenticated" outcome. Never log token contents or decoded claims.

mod access;
mod csrf;
mod error;

pub use access::AccessTokenCodec;
pub use csrf::CsrfTokenCodec;
pub use error::Error;

use pasetors::keys::SymmetricKey;
use pasetors::version4::V4;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Derive a 32-byte `v4.local` key from the configured secret.
///
/// The domain label keeps access and CSRF tokens from ever being
/// interchangeable even though both are sealed with the same secret.
fn derive_key(secret: &SecretString, domain: &str) -> Result<SymmetricKey<V4>, Error> {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"\0");
    hasher.update(secret.expose_secret().as_bytes());
    let bytes: [u8; 32] = hasher.finalize().into();
    SymmetricKey::<V4>::from(&bytes).map_err(|_| Error::InvalidKey)
}

/// Convert a unix timestamp to RFC3339.
///
/// # Errors
///
/// Returns an error if formatting fails.
pub(crate) fn rfc3339_from_unix(unix_seconds: i64) -> Result<String, Error> {
    let dt = OffsetDateTime::from_unix_timestamp(unix_seconds).map_err(|_| Error::TimeFormat)?;
    dt.format(&Rfc3339).map_err(|_| Error::TimeFormat)
}

/// Parse an RFC3339 timestamp into unix seconds.
///
/// # Errors
///
/// Returns an error if parsing fails.
pub(crate) fn unix_from_rfc3339(value: &str) -> Result<i64, Error> {
    let dt = OffsetDateTime::parse(value, &Rfc3339).map_err(|_| Error::TimeParse)?;
    Ok(dt.unix_timestamp())
}

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_round_trip() -> Result<(), Error> {
        let unix = 1_700_000_000;
        let formatted = rfc3339_from_unix(unix)?;
        assert_eq!(unix_from_rfc3339(&formatted)?, unix);
        Ok(())
    }

    #[test]
    fn unix_from_rfc3339_rejects_garbage() {
        assert!(matches!(
            unix_from_rfc3339("not-a-timestamp"),
            Err(Error::TimeParse)
        ));
    }

    #[test]
    fn derived_keys_are_deterministic_per_secret() -> Result<(), Error> {
        // Two codecs derived from the same secret must accept each other's
        // tokens; a different secret must not.
        let secret = SecretString::from("super-secret".to_string());
        let first = AccessTokenCodec::new(&secret)?;
        let second = AccessTokenCodec::new(&secret)?;
        let other = AccessTokenCodec::new(&SecretString::from("other".to_string()))?;

        let now = 1_700_000_000;
        let token = first.issue_at(3, 60, now)?;
        assert_eq!(second.verify_at(&token, now)?, 3);
        assert!(other.verify_at(&token, now).is_err());
        Ok(())
    }
}
