//! Administrative account management. Every endpoint requires the
//! administrator gate.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;
use utoipa::IntoParams;

use super::auth::principal::require_admin;
use super::auth::storage::is_unique_violation;
use super::auth::types::{ErrorResponse, UserResponse, UserUpdateRequest};
use super::auth::AuthState;
use super::detail;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "All accounts", body = [UserResponse]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    Query(query): Query<ListUsersQuery>,
) -> impl IntoResponse {
    if let Err(rejection) = require_admin(&headers, &pool, &auth).await {
        return rejection.into_response();
    }

    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(100).clamp(0, 1000);

    match fetch_users(&pool, skip, limit).await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => {
            error!("Failed to list accounts: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "The account", body = UserResponse),
        (status = 404, description = "No such account", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(rejection) = require_admin(&headers, &pool, &auth).await {
        return rejection.into_response();
    }

    match super::auth::storage::fetch_user(&pool, user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Ok(None) => not_found(),
        Err(err) => {
            error!("Failed to fetch account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/users/{user_id}",
    params(("user_id" = i64, Path, description = "Account id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Duplicate email or username", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<UserUpdateRequest>>,
) -> impl IntoResponse {
    if let Err(rejection) = require_admin(&headers, &pool, &auth).await {
        return rejection.into_response();
    }

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };

    match apply_update(&pool, user_id, &payload).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => not_found(),
        Err(err) if is_unique_violation(&err) => detail(
            StatusCode::BAD_REQUEST,
            "Email or username already registered",
        ),
        Err(err) => {
            error!("Failed to update account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = i64, Path, description = "Account id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Attempted self-deletion", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_admin(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    if principal.user_id == user_id {
        return detail(StatusCode::BAD_REQUEST, "Cannot delete your own account");
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool.0)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => not_found(),
        Err(err) => {
            error!("Failed to delete account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn not_found() -> axum::response::Response {
    detail(StatusCode::NOT_FOUND, "User not found")
}

async fn fetch_users(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<UserResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id,
            email,
            username,
            full_name,
            is_active,
            is_admin,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            CASE
                WHEN updated_at IS NULL THEN NULL
                ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
            END AS updated_at
        FROM users
        ORDER BY id
        OFFSET $1
        LIMIT $2
    "#;
    let rows = sqlx::query(query)
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| UserResponse {
            id: row.get("id"),
            email: row.get("email"),
            username: row.get("username"),
            full_name: row.get("full_name"),
            is_active: row.get("is_active"),
            is_admin: row.get("is_admin"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

async fn apply_update(
    pool: &PgPool,
    user_id: i64,
    update: &UserUpdateRequest,
) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = r#"
        UPDATE users
        SET
            email = COALESCE($1, email),
            username = COALESCE($2, username),
            full_name = COALESCE($3, full_name),
            is_active = COALESCE($4, is_active),
            is_admin = COALESCE($5, is_admin),
            updated_at = now()
        WHERE id = $6
        RETURNING
            id,
            email,
            username,
            full_name,
            is_active,
            is_admin,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    "#;
    let row = sqlx::query(query)
        .bind(update.email.as_deref())
        .bind(update.username.as_deref())
        .bind(update.full_name.as_deref())
        .bind(update.is_active)
        .bind(update.is_admin)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| UserResponse {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}
