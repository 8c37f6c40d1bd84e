use crate::api;
use crate::api::csrf::SameSite;
use crate::api::handlers::AuthConfig;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub secret: SecretString,
    pub token_ttl_seconds: i64,
    pub csrf_max_age_seconds: i64,
    pub csrf_cookie_secure: bool,
    pub csrf_cookie_same_site: SameSite,
    pub frontend_base_url: String,
}

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the server fails to
/// start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.secret, args.frontend_base_url)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_csrf_max_age_seconds(args.csrf_max_age_seconds)
        .with_csrf_cookie_secure(args.csrf_cookie_secure)
        .with_csrf_cookie_same_site(args.csrf_cookie_same_site);

    api::new(args.port, args.dsn, config).await
}
