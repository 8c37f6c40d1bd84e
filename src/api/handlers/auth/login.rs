//! Credential login and bearer-token issuance.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use super::super::detail;
use super::password;
use super::state::AuthState;
use super::storage;
use super::types::{ErrorResponse, LoginRequest, TokenResponse};
use super::utils::normalize_email;

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Account is deactivated", body = ErrorResponse),
        (status = 401, description = "Unknown identifier or wrong password", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };

    // The identifier may be a username or an email.
    let identifier = payload.username.trim();
    let lookup = if identifier.contains('@') {
        storage::fetch_user_by_identifier(&pool, &normalize_email(identifier)).await
    } else {
        storage::fetch_user_by_identifier(&pool, identifier).await
    };

    let user = match lookup {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Same outcome as a wrong password; never reveal which failed.
            debug!(outcome = "unknown_identifier", "login rejected");
            return invalid_credentials();
        }
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    // Argon2 verification is CPU-bound; keep it off the async workers.
    let password = payload.password;
    let stored_hash = user.hashed_password.clone();
    let verified = match tokio::task::spawn_blocking(move || {
        password::verify_password(&password, &stored_hash)
    })
    .await
    {
        Ok(verified) => verified,
        Err(err) => {
            error!("Verification task failed: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    if !verified {
        debug!(outcome = "bad_password", "login rejected");
        return invalid_credentials();
    }

    if !user.is_active {
        return detail(StatusCode::BAD_REQUEST, "Inactive user");
    }

    let token = match auth
        .access()
        .issue(user.id, auth.config().token_ttl_seconds())
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue access token: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    (
        StatusCode::OK,
        Json(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        }),
    )
        .into_response()
}

fn invalid_credentials() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", "Bearer")],
        Json(json!({ "detail": "Incorrect username or password" })),
    )
        .into_response()
}
