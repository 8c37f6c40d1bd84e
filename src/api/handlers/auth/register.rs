//! Account registration.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::error;

use super::super::detail;
use super::password;
use super::storage::{self, InsertOutcome, NewUser};
use super::types::{ErrorResponse, RegisterRequest, UserResponse};
use super::utils::{normalize_email, valid_email, valid_password, valid_username};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid payload or duplicate email/username", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return detail(StatusCode::BAD_REQUEST, "Invalid email address");
    }
    let username = payload.username.trim().to_string();
    if !valid_username(&username) {
        return detail(StatusCode::BAD_REQUEST, "Invalid username");
    }
    if !valid_password(&payload.password) {
        return detail(StatusCode::BAD_REQUEST, "Password is too short");
    }
    let full_name = payload
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    match storage::email_exists(&pool, &email).await {
        Ok(true) => return detail(StatusCode::BAD_REQUEST, "Email already registered"),
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check email: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }
    match storage::username_exists(&pool, &username).await {
        Ok(true) => return detail(StatusCode::BAD_REQUEST, "Username already taken"),
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check username: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }

    // The first account ever created administers the instance.
    let is_admin = match storage::count_users(&pool).await {
        Ok(count) => count == 0,
        Err(err) => {
            error!("Failed to count accounts: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    // Argon2 is deliberately slow; keep it off the async workers.
    let password = payload.password;
    let hashed = match tokio::task::spawn_blocking(move || password::hash_password(&password)).await
    {
        Ok(Ok(hashed)) => hashed,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
        Err(err) => {
            error!("Hashing task failed: {err}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let outcome = storage::insert_user(
        &pool,
        NewUser {
            email: &email,
            username: &username,
            full_name: full_name.as_deref(),
            hashed_password: &hashed,
            is_admin,
        },
    )
    .await;

    match outcome {
        Ok(InsertOutcome::Created(user)) => {
            (StatusCode::CREATED, Json(UserResponse::from(user))).into_response()
        }
        Ok(InsertOutcome::Conflict) => {
            detail(StatusCode::BAD_REQUEST, "Email or username already registered")
        }
        Err(err) => {
            error!("Failed to create account: {err}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

