//! CSRF tokens: `{nonce, iat}` sealed as PASETO `v4.local`.
//!
//! A CSRF token has no subject; it only proves that the bearer received it
//! from us recently. The double-submit pairing (cookie vs header) is enforced
//! by the guard middleware, not here.

use base64ct::{Base64UrlUnpadded, Encoding};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, V4};
use pasetors::Local;
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{derive_key, now_unix, rfc3339_from_unix, unix_from_rfc3339, Error};

const KEY_DOMAIN: &str = "csrf-token";
const NONCE_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CsrfTokenClaims {
    nonce: String,
    iat: String,
}

/// Mints and validates the opaque values of the double-submit pair.
pub struct CsrfTokenCodec {
    key: SymmetricKey<V4>,
    max_age_seconds: i64,
}

impl CsrfTokenCodec {
    /// Build a codec from the process-wide signing secret.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation fails.
    pub fn new(secret: &SecretString, max_age_seconds: i64) -> Result<Self, Error> {
        Ok(Self {
            key: derive_key(secret, KEY_DOMAIN)?,
            max_age_seconds,
        })
    }

    /// Mint a fresh token. Each call produces a distinct value.
    ///
    /// # Errors
    ///
    /// Returns an error if nonce generation or sealing fails.
    pub fn mint(&self) -> Result<String, Error> {
        self.mint_at(now_unix())
    }

    pub(crate) fn mint_at(&self, now_unix_seconds: i64) -> Result<String, Error> {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| Error::Nonce)?;
        let claims = CsrfTokenClaims {
            nonce: Base64UrlUnpadded::encode_string(&bytes),
            iat: rfc3339_from_unix(now_unix_seconds)?,
        };
        let payload = serde_json::to_vec(&claims)?;
        LocalToken::encrypt(&self.key, &payload, None, None).map_err(|_| Error::TokenFormat)
    }

    /// Validate authenticity and age of a submitted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, fails authentication, or is
    /// older than the configured max age.
    pub fn validate(&self, token: &str) -> Result<(), Error> {
        self.validate_at(token, now_unix())
    }

    pub(crate) fn validate_at(&self, token: &str, now_unix_seconds: i64) -> Result<(), Error> {
        let untrusted =
            UntrustedToken::<Local, V4>::try_from(token).map_err(|_| Error::TokenFormat)?;
        let trusted = LocalToken::decrypt(&self.key, &untrusted, None, None)
            .map_err(|_| Error::InvalidSignature)?;
        let claims: CsrfTokenClaims = serde_json::from_str(trusted.payload())?;

        let iat = unix_from_rfc3339(&claims.iat).map_err(|_| Error::InvalidIat)?;
        if iat > now_unix_seconds {
            return Err(Error::InvalidIat);
        }
        if now_unix_seconds - iat > self.max_age_seconds {
            return Err(Error::Expired);
        }
        Ok(())
    }
}
