//! Trade CRUD and close-with-P/L. Ownership is enforced through the parent
//! portfolio; every endpoint requires the active gate.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use super::auth::principal::{require_active, Principal};
use super::auth::types::ErrorResponse;
use super::auth::AuthState;
use super::detail;
use super::portfolios::owned_portfolio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Long,
    Short,
}

impl TradeType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "short" => Self::Short,
            _ => Self::Long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "closed" => Self::Closed,
            _ => Self::Open,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TradeResponse {
    pub id: i64,
    pub portfolio_id: i64,
    pub symbol: String,
    pub trade_type: TradeType,
    pub status: TradeStatus,
    pub entry_price: f64,
    pub entry_date: String,
    pub quantity: f64,
    pub exit_price: Option<f64>,
    pub exit_date: Option<String>,
    pub profit_loss: Option<f64>,
    pub profit_loss_percentage: Option<f64>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TradeCreateRequest {
    pub portfolio_id: i64,
    pub symbol: String,
    pub trade_type: TradeType,
    pub entry_price: f64,
    /// RFC3339 timestamp.
    pub entry_date: String,
    pub quantity: f64,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TradeUpdateRequest {
    pub symbol: Option<String>,
    pub trade_type: Option<TradeType>,
    pub status: Option<TradeStatus>,
    pub entry_price: Option<f64>,
    pub entry_date: Option<String>,
    pub quantity: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_date: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TradeCloseRequest {
    pub exit_price: f64,
    /// RFC3339 timestamp.
    pub exit_date: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TradeListQuery {
    pub status: Option<TradeStatus>,
}

/// Profit/loss and percentage for a finished position.
///
/// Long positions gain when the exit is above the entry; shorts gain when it
/// is below. The percentage is relative to the entry cost basis.
fn calculate_profit_loss(
    trade_type: TradeType,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
) -> (f64, f64) {
    let profit_loss = match trade_type {
        TradeType::Long => (exit_price - entry_price) * quantity,
        TradeType::Short => (entry_price - exit_price) * quantity,
    };
    let basis = entry_price * quantity;
    let percentage = if basis == 0.0 {
        0.0
    } else {
        profit_loss / basis * 100.0
    };
    (profit_loss, percentage)
}

fn valid_rfc3339(value: &str) -> bool {
    OffsetDateTime::parse(value, &Rfc3339).is_ok()
}

#[utoipa::path(
    get,
    path = "/api/trades/portfolio/{portfolio_id}",
    params(
        ("portfolio_id" = i64, Path, description = "Portfolio id"),
        TradeListQuery,
    ),
    responses(
        (status = 200, description = "Trades in the portfolio, newest entry first", body = [TradeResponse]),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn list_portfolio_trades(
    Path(portfolio_id): Path<i64>,
    Query(query): Query<TradeListQuery>,
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

    match fetch_portfolio_trades(&pool, portfolio_id, query.status).await {
        Ok(trades) => (StatusCode::OK, Json(trades)).into_response(),
        Err(err) => {
            error!("Failed to list trades: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/trades",
    request_body = TradeCreateRequest,
    responses(
        (status = 201, description = "Trade recorded", body = TradeResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Portfolio owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn create_trade(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<TradeCreateRequest>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let symbol = payload.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Symbol must not be empty");
    }
    if payload.entry_price <= 0.0 || payload.quantity <= 0.0 {
        return detail(
            StatusCode::BAD_REQUEST,
            "Entry price and quantity must be positive",
        );
    }
    if !valid_rfc3339(&payload.entry_date) {
        return detail(StatusCode::BAD_REQUEST, "Invalid entry date");
    }

    if let Err(response) = owned_portfolio(&pool, payload.portfolio_id, &principal).await {
        return response;
    }

    let query = format!(
        r"
        INSERT INTO trades (portfolio_id, symbol, trade_type, entry_price, entry_date, quantity, notes, tags)
        VALUES ($1, $2, $3, $4, $5::timestamptz, $6, $7, $8)
        RETURNING {TRADE_COLUMNS}
    "
    );
    let row = sqlx::query(&query)
        .bind(payload.portfolio_id)
        .bind(&symbol)
        .bind(payload.trade_type.as_str())
        .bind(payload.entry_price)
        .bind(&payload.entry_date)
        .bind(payload.quantity)
        .bind(payload.notes.as_deref())
        .bind(payload.tags.as_deref())
        .fetch_one(&pool.0)
        .await;

    match row {
        Ok(row) => (StatusCode::CREATED, Json(trade_from_row(&row))).into_response(),
        Err(err) => {
            error!("Failed to record trade: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/trades/{trade_id}",
    params(("trade_id" = i64, Path, description = "Trade id")),
    responses(
        (status = 200, description = "The trade", body = TradeResponse),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such trade", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn get_trade(
    Path(trade_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    match owned_trade(&pool, trade_id, &principal).await {
        Ok(trade) => (StatusCode::OK, Json(trade)).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    patch,
    path = "/api/trades/{trade_id}",
    params(("trade_id" = i64, Path, description = "Trade id")),
    request_body = TradeUpdateRequest,
    responses(
        (status = 200, description = "Updated trade", body = TradeResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such trade", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn update_trade(
    Path(trade_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<TradeUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };
    if let Some(entry_date) = payload.entry_date.as_deref() {
        if !valid_rfc3339(entry_date) {
            return detail(StatusCode::BAD_REQUEST, "Invalid entry date");
        }
    }
    if let Some(exit_date) = payload.exit_date.as_deref() {
        if !valid_rfc3339(exit_date) {
            return detail(StatusCode::BAD_REQUEST, "Invalid exit date");
        }
    }

    let current = match owned_trade(&pool, trade_id, &principal).await {
        Ok(trade) => trade,
        Err(response) => return response,
    };

    // Merge the partial update over the stored row, then recompute P/L if an
    // exit price is in play.
    let symbol = payload
        .symbol
        .map(|symbol| symbol.trim().to_uppercase())
        .unwrap_or(current.symbol);
    let trade_type = payload.trade_type.unwrap_or(current.trade_type);
    let status = payload.status.unwrap_or(current.status);
    let entry_price = payload.entry_price.unwrap_or(current.entry_price);
    let entry_date = payload.entry_date.unwrap_or(current.entry_date);
    let quantity = payload.quantity.unwrap_or(current.quantity);
    let exit_price = payload.exit_price.or(current.exit_price);
    let exit_date = payload.exit_date.or(current.exit_date);
    let notes = payload.notes.or(current.notes);
    let tags = payload.tags.or(current.tags);

    if symbol.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Symbol must not be empty");
    }
    if entry_price <= 0.0 || quantity <= 0.0 {
        return detail(
            StatusCode::BAD_REQUEST,
            "Entry price and quantity must be positive",
        );
    }

    let (profit_loss, profit_loss_percentage) = match exit_price {
        Some(exit_price) => {
            let (pl, pct) = calculate_profit_loss(trade_type, entry_price, exit_price, quantity);
            (Some(pl), Some(pct))
        }
        None => (None, None),
    };

    let query = format!(
        r"
        UPDATE trades
        SET
            symbol = $1,
            trade_type = $2,
            status = $3,
            entry_price = $4,
            entry_date = $5::timestamptz,
            quantity = $6,
            exit_price = $7,
            exit_date = $8::timestamptz,
            profit_loss = $9,
            profit_loss_percentage = $10,
            notes = $11,
            tags = $12,
            updated_at = now()
        WHERE id = $13
        RETURNING {TRADE_COLUMNS}
    "
    );
    let row = sqlx::query(&query)
        .bind(&symbol)
        .bind(trade_type.as_str())
        .bind(status.as_str())
        .bind(entry_price)
        .bind(&entry_date)
        .bind(quantity)
        .bind(exit_price)
        .bind(exit_date.as_deref())
        .bind(profit_loss)
        .bind(profit_loss_percentage)
        .bind(notes.as_deref())
        .bind(tags.as_deref())
        .bind(trade_id)
        .fetch_one(&pool.0)
        .await;

    match row {
        Ok(row) => (StatusCode::OK, Json(trade_from_row(&row))).into_response(),
        Err(err) => {
            error!("Failed to update trade: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/trades/{trade_id}/close",
    params(("trade_id" = i64, Path, description = "Trade id")),
    request_body = TradeCloseRequest,
    responses(
        (status = 200, description = "Closed trade with P/L", body = TradeResponse),
        (status = 400, description = "Trade is already closed or payload invalid", body = ErrorResponse),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such trade", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn close_trade(
    Path(trade_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<TradeCloseRequest>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(Json(payload)) = payload else {
        return detail(StatusCode::BAD_REQUEST, "Missing payload");
    };
    if !valid_rfc3339(&payload.exit_date) {
        return detail(StatusCode::BAD_REQUEST, "Invalid exit date");
    }

    let current = match owned_trade(&pool, trade_id, &principal).await {
        Ok(trade) => trade,
        Err(response) => return response,
    };
    if current.status == TradeStatus::Closed {
        return detail(StatusCode::BAD_REQUEST, "Trade is already closed");
    }

    let (profit_loss, profit_loss_percentage) = calculate_profit_loss(
        current.trade_type,
        current.entry_price,
        payload.exit_price,
        current.quantity,
    );

    let query = format!(
        r"
        UPDATE trades
        SET
            status = 'closed',
            exit_price = $1,
            exit_date = $2::timestamptz,
            profit_loss = $3,
            profit_loss_percentage = $4,
            updated_at = now()
        WHERE id = $5
        RETURNING {TRADE_COLUMNS}
    "
    );
    let row = sqlx::query(&query)
        .bind(payload.exit_price)
        .bind(&payload.exit_date)
        .bind(profit_loss)
        .bind(profit_loss_percentage)
        .bind(trade_id)
        .fetch_one(&pool.0)
        .await;

    match row {
        Ok(row) => (StatusCode::OK, Json(trade_from_row(&row))).into_response(),
        Err(err) => {
            error!("Failed to close trade: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/trades/{trade_id}",
    params(("trade_id" = i64, Path, description = "Trade id")),
    responses(
        (status = 204, description = "Trade deleted"),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such trade", body = ErrorResponse),
    ),
    tag = "trades"
)]
pub async fn delete_trade(
    Path(trade_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };

    if let Err(response) = owned_trade(&pool, trade_id, &principal).await {
        return response;
    }

    let result = sqlx::query("DELETE FROM trades WHERE id = $1")
        .bind(trade_id)
        .execute(&pool.0)
        .await;

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete trade: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

const TRADE_COLUMNS: &str = r#"
    id,
    portfolio_id,
    symbol,
    trade_type,
    status,
    entry_price,
    to_char(entry_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS entry_date,
    quantity,
    exit_price,
    CASE
        WHEN exit_date IS NULL THEN NULL
        ELSE to_char(exit_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS exit_date,
    profit_loss,
    profit_loss_percentage,
    notes,
    tags,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    CASE
        WHEN updated_at IS NULL THEN NULL
        ELSE to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
    END AS updated_at
"#;

/// Fetch a trade and enforce ownership through its parent portfolio.
async fn owned_trade(
    pool: &PgPool,
    trade_id: i64,
    principal: &Principal,
) -> Result<TradeResponse, axum::response::Response> {
    let query = format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1 LIMIT 1");
    let row = sqlx::query(&query)
        .bind(trade_id)
        .fetch_optional(pool)
        .await;

    let trade = match row {
        Ok(Some(row)) => trade_from_row(&row),
        Ok(None) => return Err(detail(StatusCode::NOT_FOUND, "Trade not found")),
        Err(err) => {
            error!("Failed to fetch trade: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    owned_portfolio(pool, trade.portfolio_id, principal).await?;
    Ok(trade)
}

async fn fetch_portfolio_trades(
    pool: &PgPool,
    portfolio_id: i64,
    status: Option<TradeStatus>,
) -> Result<Vec<TradeResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRADE_COLUMNS}
        FROM trades
        WHERE portfolio_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY entry_date DESC
    "
    );
    let rows = sqlx::query(&query)
        .bind(portfolio_id)
        .bind(status.map(TradeStatus::as_str))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(trade_from_row).collect())
}

fn trade_from_row(row: &sqlx::postgres::PgRow) -> TradeResponse {
    TradeResponse {
        id: row.get("id"),
        portfolio_id: row.get("portfolio_id"),
        symbol: row.get("symbol"),
        trade_type: TradeType::from_db(row.get("trade_type")),
        status: TradeStatus::from_db(row.get("status")),
        entry_price: row.get("entry_price"),
        entry_date: row.get("entry_date"),
        quantity: row.get("quantity"),
        exit_price: row.get("exit_price"),
        exit_date: row.get("exit_date"),
        profit_loss: row.get("profit_loss"),
        profit_loss_percentage: row.get("profit_loss_percentage"),
        notes: row.get("notes"),
        tags: row.get("tags"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_profit_and_loss() {
        let (pl, pct) = calculate_profit_loss(TradeType::Long, 100.0, 110.0, 5.0);
        assert!((pl - 50.0).abs() < f64::EPSILON);
        assert!((pct - 10.0).abs() < f64::EPSILON);

        let (pl, pct) = calculate_profit_loss(TradeType::Long, 100.0, 90.0, 5.0);
        assert!((pl + 50.0).abs() < f64::EPSILON);
        assert!((pct + 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_profit_mirrors_long() {
        let (pl, pct) = calculate_profit_loss(TradeType::Short, 100.0, 90.0, 2.0);
        assert!((pl - 20.0).abs() < f64::EPSILON);
        assert!((pct - 10.0).abs() < f64::EPSILON);

        let (pl, _) = calculate_profit_loss(TradeType::Short, 100.0, 110.0, 2.0);
        assert!((pl + 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_basis_yields_zero_percentage() {
        let (pl, pct) = calculate_profit_loss(TradeType::Long, 0.0, 10.0, 0.0);
        assert!(pl.abs() < f64::EPSILON);
        assert!(pct.abs() < f64::EPSILON);
    }

    #[test]
    fn trade_type_round_trips_through_db_strings() {
        assert_eq!(TradeType::from_db(TradeType::Long.as_str()), TradeType::Long);
        assert_eq!(
            TradeType::from_db(TradeType::Short.as_str()),
            TradeType::Short
        );
        assert_eq!(
            TradeStatus::from_db(TradeStatus::Closed.as_str()),
            TradeStatus::Closed
        );
        assert_eq!(TradeStatus::from_db("open"), TradeStatus::Open);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&TradeType::Long).expect("serialize"),
            r#""long""#
        );
        assert_eq!(
            serde_json::to_string(&TradeStatus::Closed).expect("serialize"),
            r#""closed""#
        );
    }

    #[test]
    fn rfc3339_validation() {
        assert!(valid_rfc3339("2026-01-15T10:30:00Z"));
        assert!(valid_rfc3339("2026-01-15T10:30:00+02:00"));
        assert!(!valid_rfc3339("2026-01-15"));
        assert!(!valid_rfc3339("yesterday"));
    }
}
