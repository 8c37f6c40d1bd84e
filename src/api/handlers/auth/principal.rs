//! Authenticated principal resolution and the authorization chain.
//!
//! Flow Overview: extract the bearer token, verify it, load the account it
//! names, then apply the gate the handler asked for. The gates escalate —
//! authenticated, active, administrator — and each is a read-only check a
//! handler can invoke independently.
//!
//! Every token-verification failure collapses to the same unauthenticated
//! outcome; which check failed is logged server-side as an outcome kind only,
//! never with token contents.

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error};

use super::state::AuthState;
use super::storage::{self, UserRow};

/// The account a request is acting as, resolved from a verified token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub active: bool,
    pub is_admin: bool,
}

impl From<UserRow> for Principal {
    fn from(user: UserRow) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            username: user.username,
            active: user.is_active,
            is_admin: user.is_admin,
        }
    }
}

/// Terminal authorization failures, surfaced as coarse HTTP outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzRejection {
    Unauthenticated,
    AccountInactive,
    InsufficientPrivilege,
    Internal,
}

impl AuthzRejection {
    const fn status(self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AccountInactive => StatusCode::BAD_REQUEST,
            Self::InsufficientPrivilege => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn detail(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Could not validate credentials",
            Self::AccountInactive => "Inactive user",
            Self::InsufficientPrivilege => "Not enough permissions",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for AuthzRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.detail() }));
        if self == Self::Unauthenticated {
            (
                self.status(),
                [("WWW-Authenticate", "Bearer")],
                body,
            )
                .into_response()
        } else {
            (self.status(), body).into_response()
        }
    }
}

/// Stage 1+2: a present, verified token naming an existing account.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
) -> Result<Principal, AuthzRejection> {
    let Some(token) = extract_bearer_token(headers) else {
        debug!(outcome = "missing_token", "bearer auth failed");
        return Err(AuthzRejection::Unauthenticated);
    };

    let subject = match auth.access().verify(&token) {
        Ok(subject) => subject,
        Err(err) => {
            debug!(outcome = %err, "bearer auth failed");
            return Err(AuthzRejection::Unauthenticated);
        }
    };

    match storage::fetch_user(pool, subject).await {
        Ok(Some(user)) => Ok(Principal::from(user)),
        Ok(None) => {
            debug!(outcome = "unknown_subject", "bearer auth failed");
            Err(AuthzRejection::Unauthenticated)
        }
        Err(err) => {
            error!("Failed to load principal: {err}");
            Err(AuthzRejection::Internal)
        }
    }
}

/// Stage 3: the account must not be deactivated.
pub async fn require_active(
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
) -> Result<Principal, AuthzRejection> {
    let principal = require_auth(headers, pool, auth).await?;
    check_active(&principal)?;
    Ok(principal)
}

/// Stage 4: the account must be an administrator.
pub async fn require_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    auth: &AuthState,
) -> Result<Principal, AuthzRejection> {
    let principal = require_active(headers, pool, auth).await?;
    check_admin(&principal)?;
    Ok(principal)
}

fn check_active(principal: &Principal) -> Result<(), AuthzRejection> {
    if principal.active {
        Ok(())
    } else {
        Err(AuthzRejection::AccountInactive)
    }
}

fn check_admin(principal: &Principal) -> Result<(), AuthzRejection> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(AuthzRejection::InsufficientPrivilege)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn principal(active: bool, is_admin: bool) -> Principal {
        Principal {
            user_id: 1,
            email: "a@example.com".to_string(),
            username: "a".to_string(),
            active,
            is_admin,
        }
    }

    #[test]
    fn inactive_never_passes_active_gate() {
        assert_eq!(
            check_active(&principal(false, true)),
            Err(AuthzRejection::AccountInactive)
        );
        assert_eq!(check_active(&principal(true, false)), Ok(()));
    }

    #[test]
    fn non_admin_never_passes_admin_gate() {
        assert_eq!(
            check_admin(&principal(true, false)),
            Err(AuthzRejection::InsufficientPrivilege)
        );
        assert_eq!(check_admin(&principal(true, true)), Ok(()));
    }

    #[test]
    fn rejection_statuses() {
        assert_eq!(
            AuthzRejection::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthzRejection::AccountInactive.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthzRejection::InsufficientPrivilege.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
