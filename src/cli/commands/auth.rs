use clap::{Arg, Command};

pub const ARG_SECRET: &str = "secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_CSRF_MAX_AGE_SECONDS: &str = "csrf-max-age-seconds";
pub const ARG_CSRF_COOKIE_SECURE: &str = "csrf-cookie-secure";
pub const ARG_CSRF_COOKIE_SAMESITE: &str = "csrf-cookie-samesite";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET)
                .long("secret")
                .help("Signing secret for access and CSRF tokens")
                .env("TRADELOG_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long("token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("TRADELOG_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CSRF_MAX_AGE_SECONDS)
                .long("csrf-max-age-seconds")
                .help("CSRF token and cookie max age in seconds")
                .env("TRADELOG_CSRF_MAX_AGE_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CSRF_COOKIE_SECURE)
                .long("csrf-cookie-secure")
                .help("Set the Secure flag on the CSRF cookie")
                .env("TRADELOG_CSRF_COOKIE_SECURE")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_CSRF_COOKIE_SAMESITE)
                .long("csrf-cookie-samesite")
                .help("SameSite policy for the CSRF cookie: lax, strict or none")
                .env("TRADELOG_CSRF_COOKIE_SAMESITE")
                .default_value("lax"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long("frontend-base-url")
                .help("Frontend origin allowed by CORS")
                .env("TRADELOG_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
}
