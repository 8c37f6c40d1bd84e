//! Double-submit-cookie CSRF protection.
//!
//! Flow Overview: every state-changing request must present the same minted
//! token twice — once in the `csrf_token` cookie (attached by the browser)
//! and once in the `X-CSRF-Token` header (readable only by same-origin
//! script). The guard checks exemption, presence, byte equality, and token
//! authenticity/age in that order, before the request reaches any handler.
//! Every non-error response leaves with a freshly minted token, bounding the
//! replay window of a captured value to one request cycle.

pub(crate) mod policy;

pub use policy::ExemptionPolicy;

use axum::{
    extract::{Request, State},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::token::CsrfTokenCodec;

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// `SameSite` attribute for the CSRF cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            _ => Err(format!("invalid SameSite value: {value}")),
        }
    }
}

/// Cookie attributes applied to every issued CSRF cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_seconds: i64,
}

/// Why a protected request was refused. The caller always sees a fixed 403;
/// the variant only feeds server-side diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CsrfRejection {
    Missing,
    Mismatch,
    InvalidOrExpired,
}

impl CsrfRejection {
    pub(crate) const fn kind(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Mismatch => "mismatch",
            Self::InvalidOrExpired => "invalid_or_expired",
        }
    }

    const fn detail(self) -> &'static str {
        match self {
            Self::Missing => "CSRF token missing",
            Self::Mismatch => "CSRF token mismatch",
            Self::InvalidOrExpired => "CSRF token invalid or expired",
        }
    }
}

impl IntoResponse for CsrfRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": self.detail() })),
        )
            .into_response()
    }
}

/// Process-wide CSRF state: token codec, exemption policy, cookie attributes.
/// Built once at startup and shared read-only across requests.
pub struct CsrfGuard {
    codec: CsrfTokenCodec,
    policy: ExemptionPolicy,
    cookie: CookieOptions,
}

impl CsrfGuard {
    /// # Errors
    ///
    /// Returns an error if key derivation from the secret fails.
    pub fn new(
        secret: &SecretString,
        policy: ExemptionPolicy,
        cookie: CookieOptions,
    ) -> Result<Self, crate::token::Error> {
        Ok(Self {
            codec: CsrfTokenCodec::new(secret, cookie.max_age_seconds)?,
            policy,
            cookie,
        })
    }

    /// Validate the double-submit pair. Order matters: presence, equality,
    /// then authenticity, so an attacker-set cookie without the paired header
    /// never reaches signature validation.
    pub(crate) fn check(
        &self,
        header_token: Option<&str>,
        cookie_token: Option<&str>,
    ) -> Result<(), CsrfRejection> {
        let (Some(header_token), Some(cookie_token)) = (header_token, cookie_token) else {
            return Err(CsrfRejection::Missing);
        };
        if header_token != cookie_token {
            return Err(CsrfRejection::Mismatch);
        }
        self.codec
            .validate(header_token)
            .map_err(|_| CsrfRejection::InvalidOrExpired)
    }

    /// Attach a freshly minted token to `response` as cookie and header.
    fn rotate(&self, mut response: Response) -> Response {
        let token = match self.codec.mint() {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to mint CSRF token: {err}");
                return response;
            }
        };
        match self.csrf_cookie(&token) {
            Ok(cookie) => {
                response.headers_mut().insert(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build CSRF cookie: {err}");
                return response;
            }
        }
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(CSRF_HEADER_NAME, value);
        }
        response
    }

    /// Build the `HttpOnly` cookie carrying the token.
    fn csrf_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{CSRF_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
            self.cookie.same_site.as_str(),
            self.cookie.max_age_seconds
        );
        if self.cookie.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Methods with create/update/replace/delete semantics.
fn is_protected_method(method: &Method) -> bool {
    method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE
}

/// axum middleware enforcing the guard. Validation always completes before
/// the inner service runs; rotation happens on the way out.
pub async fn guard(
    State(guard): State<Arc<CsrfGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    if guard.policy.is_exempt(&path) {
        let response = next.run(request).await;
        // Exempt auth entry points still seed the first token of a session.
        if method == Method::POST
            && guard.policy.issues_token(&path)
            && !response.status().is_client_error()
            && !response.status().is_server_error()
        {
            return guard.rotate(response);
        }
        return response;
    }

    if is_protected_method(&method) {
        let header_token = request
            .headers()
            .get(CSRF_HEADER_NAME)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let cookie_token = cookie_value(request.headers(), CSRF_COOKIE_NAME);

        if let Err(rejection) = guard.check(header_token.as_deref(), cookie_token.as_deref()) {
            debug!(kind = rejection.kind(), "CSRF validation failed");
            return rejection.into_response();
        }
    }

    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        return response;
    }
    guard.rotate(response)
}

/// Pull a single cookie value out of the `Cookie` header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_guard(max_age_seconds: i64) -> CsrfGuard {
        CsrfGuard::new(
            &SecretString::from("unit-test-secret".to_string()),
            ExemptionPolicy::defaults(),
            CookieOptions {
                secure: true,
                same_site: SameSite::Lax,
                max_age_seconds,
            },
        )
        .expect("guard builds")
    }

    #[test]
    fn matching_valid_pair_passes() {
        let guard = test_guard(3600);
        let token = guard.codec.mint().expect("mint");
        assert_eq!(guard.check(Some(&token), Some(&token)), Ok(()));
    }

    #[test]
    fn missing_header_or_cookie_is_rejected() {
        let guard = test_guard(3600);
        let token = guard.codec.mint().expect("mint");
        assert_eq!(
            guard.check(None, Some(&token)),
            Err(CsrfRejection::Missing)
        );
        assert_eq!(
            guard.check(Some(&token), None),
            Err(CsrfRejection::Missing)
        );
        assert_eq!(guard.check(None, None), Err(CsrfRejection::Missing));
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let guard = test_guard(3600);
        let first = guard.codec.mint().expect("mint");
        let second = guard.codec.mint().expect("mint");
        assert_eq!(
            guard.check(Some(&first), Some(&second)),
            Err(CsrfRejection::Mismatch)
        );
    }

    #[test]
    fn forged_pair_is_rejected() {
        let guard = test_guard(3600);
        // Matching values that we never minted must fail authenticity.
        assert_eq!(
            guard.check(Some("v4.local.forged"), Some("v4.local.forged")),
            Err(CsrfRejection::InvalidOrExpired)
        );
    }

    #[test]
    fn stale_pair_is_rejected() {
        let guard = test_guard(0);
        let token = guard.codec.mint_at(0).expect("mint");
        assert_eq!(
            guard.check(Some(&token), Some(&token)),
            Err(CsrfRejection::InvalidOrExpired)
        );
    }

    #[test]
    fn rotation_attaches_fresh_cookie_and_header() {
        let guard = test_guard(3600);
        let response = guard.rotate(Response::new(axum::body::Body::empty()));

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("cookie set");
        assert!(cookie.starts_with("csrf_token=v4.local."));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("Secure"));

        let echoed = response
            .headers()
            .get(CSRF_HEADER_NAME)
            .and_then(|value| value.to_str().ok())
            .expect("header echoed");
        assert!(cookie.contains(echoed));
    }

    #[test]
    fn rotation_produces_distinct_tokens() {
        let guard = test_guard(3600);
        let first = guard.rotate(Response::new(axum::body::Body::empty()));
        let second = guard.rotate(Response::new(axum::body::Body::empty()));
        assert_ne!(
            first.headers().get(CSRF_HEADER_NAME),
            second.headers().get(CSRF_HEADER_NAME)
        );
    }

    #[test]
    fn insecure_cookie_omits_secure_flag() {
        let guard = CsrfGuard::new(
            &SecretString::from("unit-test-secret".to_string()),
            ExemptionPolicy::defaults(),
            CookieOptions {
                secure: false,
                same_site: SameSite::Strict,
                max_age_seconds: 60,
            },
        )
        .expect("guard builds");
        let cookie = guard.csrf_cookie("token").expect("cookie builds");
        let cookie = cookie.to_str().expect("ascii");
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
    }

    #[test]
    fn protected_method_set() {
        assert!(is_protected_method(&Method::POST));
        assert!(is_protected_method(&Method::PUT));
        assert!(is_protected_method(&Method::PATCH));
        assert!(is_protected_method(&Method::DELETE));
        assert!(!is_protected_method(&Method::GET));
        assert!(!is_protected_method(&Method::HEAD));
        assert!(!is_protected_method(&Method::OPTIONS));
    }

    #[test]
    fn cookie_value_parses_multi_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("session=abc; csrf_token=xyz; theme=dark"),
        );
        assert_eq!(cookie_value(&headers, "csrf_token"), Some("xyz".to_string()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!("LAX".parse::<SameSite>(), Ok(SameSite::Lax));
        assert_eq!("strict".parse::<SameSite>(), Ok(SameSite::Strict));
        assert_eq!("None".parse::<SameSite>(), Ok(SameSite::None));
        assert!("never".parse::<SameSite>().is_err());
    }
}
