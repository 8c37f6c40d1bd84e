//! Portfolio CRUD. Every endpoint requires the active gate; records are
//! scoped to their owner.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::principal::{require_active, Principal};
use super::auth::types::ErrorResponse;
use super::auth::AuthState;
use super::detail;

#[derive(Debug, Serialize, ToSchema)]
pub struct PortfolioResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub initial_balance: f64,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub initial_balance: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PortfolioUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub initial_balance: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/portfolios",
    responses(
        (status = 200, description = "The caller's portfolios", body = [PortfolioResponse]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
    ),
    tag = "portfolios"
)]
pub async fn list_portfolios(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    match fetch_user_portfolios(&pool, principal.user_id).await {
        Ok(portfolios) => (StatusCode::OK, Json(portfolios)).into_response(),
        Err(err) => {
            error!("Failed to list portfolios: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/portfolios",
    request_body = PortfolioCreateRequest,
    responses(
        (status = 201, description = "Portfolio created", body = PortfolioResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
    ),
    tag = "portfolios"
)]
pub async fn create_portfolio(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<PortfolioCreateRequest>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Portfolio name must not be empty");
    }

    let query = r#"
        INSERT INTO portfolios (name, description, initial_balance, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id,
            name,
            description,
            initial_balance,
            user_id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            CASE
                WHEN updated_at IS NULL THEN NULL
                ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
            END AS updated_at
    "#;
    let row = sqlx::query(query)
        .bind(&name)
        .bind(payload.description.as_deref())
        .bind(payload.initial_balance.unwrap_or(0.0))
        .bind(principal.user_id)
        .fetch_one(&pool.0)
        .await;

    match row {
        Ok(row) => (StatusCode::CREATED, Json(portfolio_from_row(&row))).into_response(),
        Err(err) => {
            error!("Failed to create portfolio: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/portfolios/{portfolio_id}",
    params(("portfolio_id" = i64, Path, description = "Portfolio id")),
    responses(
        (status = 200, description = "The portfolio", body = PortfolioResponse),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "portfolios"
)]
pub async fn get_portfolio(
    Path(portfolio_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    match owned_portfolio(&pool, portfolio_id, &principal).await {
        Ok(portfolio) => (StatusCode::OK, Json(portfolio)).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    patch,
    path = "/api/portfolios/{portfolio_id}",
    params(("portfolio_id" = i64, Path, description = "Portfolio id")),
    request_body = PortfolioUpdateRequest,
    responses(
        (status = 200, description = "Updated portfolio", body = PortfolioResponse),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "portfolios"
)]
pub async fn update_portfolio(
    Path(portfolio_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<PortfolioUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };

    if let Err(response) = owned_portfolio(&pool, portfolio_id, &principal).await {
        return response;
    }

    let query = r#"
        UPDATE portfolios
        SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            initial_balance = COALESCE($3, initial_balance),
            updated_at = now()
        WHERE id = $4
        RETURNING
            id,
            name,
            description,
            initial_balance,
            user_id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    "#;
    let row = sqlx::query(query)
        .bind(payload.name.as_deref().map(str::trim))
        .bind(payload.description.as_deref())
        .bind(payload.initial_balance)
        .bind(portfolio_id)
        .fetch_one(&pool.0)
        .await;

    match row {
        Ok(row) => (StatusCode::OK, Json(portfolio_from_row(&row))).into_response(),
        Err(err) => {
            error!("Failed to update portfolio: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/portfolios/{portfolio_id}",
    params(("portfolio_id" = i64, Path, description = "Portfolio id")),
    responses(
        (status = 204, description = "Portfolio and its trades deleted"),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "portfolios"
)]
pub async fn delete_portfolio(
    Path(portfolio_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    if let Err(response) = owned_portfolio(&pool, portfolio_id, &principal).await {
        return response;
    }

    let result = sqlx::query("DELETE FROM portfolios WHERE id = $1")
        .bind(portfolio_id)
        .execute(&pool.0)
        .await;

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete portfolio: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fetch a portfolio and enforce ownership: 404 when missing, 403 when owned
/// by someone else. Shared with the trade and analytics handlers.
pub(super) async fn owned_portfolio(
    pool: &PgPool,
    portfolio_id: i64,
    principal: &Principal,
) -> Result<PortfolioResponse, axum::response::Response> {
    match fetch_portfolio(pool, portfolio_id).await {
        Ok(Some(portfolio)) => {
            if portfolio.user_id == principal.user_id {
                Ok(portfolio)
            } else {
                Err(detail(
                    StatusCode::FORBIDDEN,
                    "Not authorized to access this portfolio",
                ))
            }
        }
        Ok(None) => Err(detail(StatusCode::NOT_FOUND, "Portfolio not found")),
        Err(err) => {
            error!("Failed to fetch portfolio: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn fetch_portfolio(
    pool: &PgPool,
    portfolio_id: i64,
) -> Result<Option<PortfolioResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id,
            name,
            description,
            initial_balance,
            user_id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            CASE
                WHEN updated_at IS NULL THEN NULL
                ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
            END AS updated_at
        FROM portfolios
        WHERE id = $1
        LIMIT 1
    "#;
    let row = sqlx::query(query)
        .bind(portfolio_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(portfolio_from_row))
}

async fn fetch_user_portfolios(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<PortfolioResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id,
            name,
            description,
            initial_balance,
            user_id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            CASE
                WHEN updated_at IS NULL THEN NULL
                ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
            END AS updated_at
        FROM portfolios
        WHERE user_id = $1
        ORDER BY created_at DESC
    "#;
    let rows = sqlx::query(query).bind(user_id).fetch_all(pool).await?;
    Ok(rows.iter().map(portfolio_from_row).collect())
}

fn portfolio_from_row(row: &sqlx::postgres::PgRow) -> PortfolioResponse {
    PortfolioResponse {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        initial_balance: row.get("initial_balance"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
