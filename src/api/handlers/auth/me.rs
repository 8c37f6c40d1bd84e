//! Authenticated self-lookup.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::principal::require_active;
use super::state::AuthState;
use super::storage;
use super::types::{ErrorResponse, UserResponse};

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The authenticated account", body = UserResponse),
        (status = 400, description = "Account is deactivated", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    match storage::fetch_user(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
