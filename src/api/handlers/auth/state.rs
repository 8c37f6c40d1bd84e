//! Auth configuration and shared state.
//!
//! Configuration is parsed once at startup, frozen into [`AuthConfig`], and
//! passed by value into the components that need it. Nothing mutates it
//! afterwards, so request handling never takes a lock.

use secrecy::SecretString;

use crate::api::csrf::SameSite;
use crate::token::{AccessTokenCodec, Error as TokenError};

pub(crate) const DEFAULT_TOKEN_TTL_SECONDS: i64 = 30 * 60;
pub(crate) const DEFAULT_CSRF_MAX_AGE_SECONDS: i64 = 3600;

#[derive(Clone)]
pub struct AuthConfig {
    secret: SecretString,
    token_ttl_seconds: i64,
    csrf_max_age_seconds: i64,
    csrf_cookie_secure: bool,
    csrf_cookie_same_site: SameSite,
    frontend_base_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            csrf_max_age_seconds: DEFAULT_CSRF_MAX_AGE_SECONDS,
            csrf_cookie_secure: true,
            csrf_cookie_same_site: SameSite::Lax,
            frontend_base_url,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_csrf_max_age_seconds(mut self, seconds: i64) -> Self {
        self.csrf_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_csrf_cookie_secure(mut self, secure: bool) -> Self {
        self.csrf_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_csrf_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.csrf_cookie_same_site = same_site;
        self
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn csrf_max_age_seconds(&self) -> i64 {
        self.csrf_max_age_seconds
    }

    #[must_use]
    pub fn csrf_cookie_secure(&self) -> bool {
        self.csrf_cookie_secure
    }

    #[must_use]
    pub fn csrf_cookie_same_site(&self) -> SameSite {
        self.csrf_cookie_same_site
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"***")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("csrf_max_age_seconds", &self.csrf_max_age_seconds)
            .field("csrf_cookie_secure", &self.csrf_cookie_secure)
            .field("csrf_cookie_same_site", &self.csrf_cookie_same_site)
            .field("frontend_base_url", &self.frontend_base_url)
            .finish()
    }
}

/// Shared auth state: frozen configuration plus the bearer-token codec.
pub struct AuthState {
    config: AuthConfig,
    access: AccessTokenCodec,
}

impl AuthState {
    /// # Errors
    ///
    /// Returns an error if key derivation from the configured secret fails.
    pub fn new(config: AuthConfig) -> Result<Self, TokenError> {
        let access = AccessTokenCodec::new(config.secret())?;
        Ok(Self { config, access })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn access(&self) -> &AccessTokenCodec {
        &self.access
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("unit-test-secret".to_string()),
            "http://localhost:3000".to_string(),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();
        assert_eq!(config.token_ttl_seconds(), DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(config.csrf_max_age_seconds(), DEFAULT_CSRF_MAX_AGE_SECONDS);
        assert!(config.csrf_cookie_secure());
        assert_eq!(config.csrf_cookie_same_site(), SameSite::Lax);

        let config = config
            .with_token_ttl_seconds(60)
            .with_csrf_max_age_seconds(120)
            .with_csrf_cookie_secure(false)
            .with_csrf_cookie_same_site(SameSite::Strict);

        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.csrf_max_age_seconds(), 120);
        assert!(!config.csrf_cookie_secure());
        assert_eq!(config.csrf_cookie_same_site(), SameSite::Strict);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("unit-test-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn auth_state_round_trips_a_token() {
        let state = AuthState::new(config()).expect("state builds");
        let token = state.access().issue(9, 60).expect("issue");
        assert_eq!(state.access().verify(&token).expect("verify"), 9);
    }
}
