//! Bearer access tokens: `{sub, iat, exp}` sealed as PASETO `v4.local`.

use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, V4};
use pasetors::Local;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{derive_key, now_unix, rfc3339_from_unix, unix_from_rfc3339, Error};

const KEY_DOMAIN: &str = "access-token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct AccessTokenClaims {
    sub: String,
    iat: String,
    exp: String,
}

/// Issues and verifies bearer tokens for authenticated principals.
///
/// Tokens are stateless: the subject id and absolute expiry travel inside the
/// sealed payload, so there is no server-side session table and no revocation
/// path short of expiry.
pub struct AccessTokenCodec {
    key: SymmetricKey<V4>,
}

impl AccessTokenCodec {
    /// Build a codec from the process-wide signing secret.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation fails.
    pub fn new(secret: &SecretString) -> Result<Self, Error> {
        Ok(Self {
            key: derive_key(secret, KEY_DOMAIN)?,
        })
    }

    /// Issue a token for `subject` expiring `ttl_seconds` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if claim encoding or sealing fails.
    pub fn issue(&self, subject: i64, ttl_seconds: i64) -> Result<String, Error> {
        self.issue_at(subject, ttl_seconds, now_unix())
    }

    pub(crate) fn issue_at(
        &self,
        subject: i64,
        ttl_seconds: i64,
        now_unix_seconds: i64,
    ) -> Result<String, Error> {
        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            iat: rfc3339_from_unix(now_unix_seconds)?,
            exp: rfc3339_from_unix(now_unix_seconds + ttl_seconds)?,
        };
        self.seal(&claims)
    }

    fn seal(&self, claims: &AccessTokenClaims) -> Result<String, Error> {
        let payload = serde_json::to_vec(claims)?;
        LocalToken::encrypt(&self.key, &payload, None, None).map_err(|_| Error::TokenFormat)
    }

    /// Verify a token and return its subject id.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, fails authentication, is
    /// expired, or carries a missing/non-numeric subject. Callers at the HTTP
    /// boundary must collapse every variant into a single unauthenticated
    /// outcome.
    pub fn verify(&self, token: &str) -> Result<i64, Error> {
        self.verify_at(token, now_unix())
    }

    pub(crate) fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<i64, Error> {
        let untrusted =
            UntrustedToken::<Local, V4>::try_from(token).map_err(|_| Error::TokenFormat)?;
        let trusted = LocalToken::decrypt(&self.key, &untrusted, None, None)
            .map_err(|_| Error::InvalidSignature)?;
        let claims: AccessTokenClaims = serde_json::from_str(trusted.payload())?;

        let iat = unix_from_rfc3339(&claims.iat).map_err(|_| Error::InvalidIat)?;
        let exp = unix_from_rfc3339(&claims.exp).map_err(|_| Error::InvalidExp)?;
        if iat > now_unix_seconds {
            return Err(Error::InvalidIat);
        }
        if exp <= now_unix_seconds {
            return Err(Error::Expired);
        }

        claims.sub.parse::<i64>().map_err(|_| Error::InvalidSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> Result<AccessTokenCodec, Error> {
        AccessTokenCodec::new(&SecretString::from("unit-test-secret".to_string()))
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<(), Error> {
        let codec = codec()?;
        let token = codec.issue_at(42, 1800, NOW)?;
        assert_eq!(codec.verify_at(&token, NOW)?, 42);
        Ok(())
    }

    #[test]
    fn zero_ttl_is_already_expired() -> Result<(), Error> {
        let codec = codec()?;
        let token = codec.issue_at(42, 0, NOW)?;
        assert!(matches!(
            codec.verify_at(&token, NOW),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_after_expiry() -> Result<(), Error> {
        let codec = codec()?;
        let token = codec.issue_at(42, 1800, NOW)?;
        assert!(matches!(
            codec.verify_at(&token, NOW + 1801),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_future_issued_at() -> Result<(), Error> {
        let codec = codec()?;
        let token = codec.issue_at(42, 1800, NOW)?;
        assert!(matches!(
            codec.verify_at(&token, NOW - 10),
            Err(Error::InvalidIat)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_tampered_payload() -> Result<(), Error> {
        let codec = codec()?;
        let token = codec.issue_at(42, 1800, NOW)?;

        // Flip a single character inside the sealed body; any byte change
        // must break authentication. Stay clear of the final character,
        // whose trailing base64 bits do not all carry data.
        let mut bytes = token.into_bytes();
        let index = "v4.local.".len() + 10;
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).expect("token stays ascii");

        assert!(matches!(
            codec.verify_at(&tampered, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_other_key() -> Result<(), Error> {
        let codec = codec()?;
        let other = AccessTokenCodec::new(&SecretString::from("other-secret".to_string()))?;
        let token = codec.issue_at(42, 1800, NOW)?;
        assert!(matches!(
            other.verify_at(&token, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_non_numeric_subject() -> Result<(), Error> {
        let codec = codec()?;
        let claims = AccessTokenClaims {
            sub: "not-a-number".to_string(),
            iat: rfc3339_from_unix(NOW)?,
            exp: rfc3339_from_unix(NOW + 60)?,
        };
        let token = codec.seal(&claims)?;
        assert!(matches!(
            codec.verify_at(&token, NOW),
            Err(Error::InvalidSubject)
        ));
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage() -> Result<(), Error> {
        let codec = codec()?;
        assert!(matches!(
            codec.verify_at("not-a-token", NOW),
            Err(Error::TokenFormat)
        ));
        Ok(())
    }
}
