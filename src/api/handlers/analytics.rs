//! Portfolio performance summaries over closed trades.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::principal::require_active;
use super::auth::types::ErrorResponse;
use super::auth::AuthState;
use super::portfolios::owned_portfolio;

#[derive(Debug, Clone)]
struct ClosedTrade {
    id: i64,
    symbol: String,
    profit_loss: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TradeRef {
    pub id: i64,
    pub symbol: String,
    pub profit_loss: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortfolioAnalytics {
    pub portfolio_id: i64,
    pub portfolio_name: String,
    pub total_trades: i64,
    pub total_profit_loss: f64,
    pub win_rate: f64,
    pub average_profit_loss: f64,
    pub best_trade: Option<TradeRef>,
    pub worst_trade: Option<TradeRef>,
    pub total_wins: i64,
    pub total_losses: i64,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SymbolStats {
    pub symbol: String,
    pub total_trades: i64,
    pub total_profit_loss: f64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SymbolAnalytics {
    pub symbols: Vec<SymbolStats>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregate closed trades into the portfolio summary. Wins are strictly
/// positive; break-even trades count as losses, matching the win-rate
/// convention of the journal.
fn summarize(portfolio_id: i64, portfolio_name: &str, closed: &[ClosedTrade]) -> PortfolioAnalytics {
    let total_trades = closed.len() as i64;
    if total_trades == 0 {
        return PortfolioAnalytics {
            portfolio_id,
            portfolio_name: portfolio_name.to_string(),
            total_trades: 0,
            total_profit_loss: 0.0,
            win_rate: 0.0,
            average_profit_loss: 0.0,
            best_trade: None,
            worst_trade: None,
            total_wins: 0,
            total_losses: 0,
            average_win: 0.0,
            average_loss: 0.0,
            profit_factor: 0.0,
        };
    }

    let total_pl: f64 = closed.iter().map(|trade| trade.profit_loss).sum();
    let wins: Vec<&ClosedTrade> = closed.iter().filter(|t| t.profit_loss > 0.0).collect();
    let losses: Vec<&ClosedTrade> = closed.iter().filter(|t| t.profit_loss <= 0.0).collect();

    let total_wins = wins.len() as i64;
    let total_losses = losses.len() as i64;
    let win_amount: f64 = wins.iter().map(|t| t.profit_loss).sum();
    let loss_amount: f64 = losses.iter().map(|t| t.profit_loss).sum::<f64>().abs();

    let average_win = if total_wins > 0 {
        win_amount / total_wins as f64
    } else {
        0.0
    };
    let average_loss = if total_losses > 0 {
        losses.iter().map(|t| t.profit_loss).sum::<f64>() / total_losses as f64
    } else {
        0.0
    };
    let profit_factor = if loss_amount > 0.0 {
        win_amount / loss_amount
    } else {
        0.0
    };

    let best = closed
        .iter()
        .max_by(|a, b| a.profit_loss.total_cmp(&b.profit_loss));
    let worst = closed
        .iter()
        .min_by(|a, b| a.profit_loss.total_cmp(&b.profit_loss));

    PortfolioAnalytics {
        portfolio_id,
        portfolio_name: portfolio_name.to_string(),
        total_trades,
        total_profit_loss: round2(total_pl),
        win_rate: round2(total_wins as f64 / total_trades as f64 * 100.0),
        average_profit_loss: round2(total_pl / total_trades as f64),
        best_trade: best.map(trade_ref),
        worst_trade: worst.map(trade_ref),
        total_wins,
        total_losses,
        average_win: round2(average_win),
        average_loss: round2(average_loss),
        profit_factor: round2(profit_factor),
    }
}

fn trade_ref(trade: &ClosedTrade) -> TradeRef {
    TradeRef {
        id: trade.id,
        symbol: trade.symbol.clone(),
        profit_loss: round2(trade.profit_loss),
    }
}

/// Group closed trades by symbol, ordered by symbol for stable output.
fn summarize_by_symbol(closed: &[ClosedTrade]) -> Vec<SymbolStats> {
    let mut grouped: BTreeMap<&str, Vec<&ClosedTrade>> = BTreeMap::new();
    for trade in closed {
        grouped.entry(trade.symbol.as_str()).or_default().push(trade);
    }

    grouped
        .into_iter()
        .map(|(symbol, trades)| {
            let total_trades = trades.len() as i64;
            let wins = trades.iter().filter(|t| t.profit_loss > 0.0).count() as i64;
            let total_pl: f64 = trades.iter().map(|t| t.profit_loss).sum();
            SymbolStats {
                symbol: symbol.to_string(),
                total_trades,
                total_profit_loss: round2(total_pl),
                wins,
                losses: total_trades - wins,
                win_rate: round2(wins as f64 / total_trades as f64 * 100.0),
            }
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/analytics/portfolio/{portfolio_id}",
    params(("portfolio_id" = i64, Path, description = "Portfolio id")),
    responses(
        (status = 200, description = "Closed-trade summary", body = PortfolioAnalytics),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "analytics"
)]
pub async fn portfolio_analytics(
    Path(portfolio_id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_active(&headers, &pool, &auth).await {
        Ok(principal) => principal,
        Err(rejection) => return rejection.into_response(),
    };
    let portfolio = match owned_portfolio(&pool, portfolio_id, &principal).await {
        Ok(portfolio) => portfolio,
        Err(response) => return response,
    };

    match fetch_closed_trades(&pool, portfolio_id).await {
        Ok(closed) => (
            StatusCode::OK,
            Json(summarize(portfolio_id, &portfolio.name, &closed)),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load closed trades: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/analytics/portfolio/{portfolio_id}/by-symbol",
    params(("portfolio_id" = i64, Path, description = "Portfolio id")),
    responses(
        (status = 200, description = "Per-symbol summary", body = SymbolAnalytics),
        (status = 403, description = "Owned by another account", body = ErrorResponse),
        (status = 404, description = "No such portfolio", body = ErrorResponse),
    ),
    tag = "analytics"
)]
pub async fn portfolio_analytics_by_symbol(
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

    match fetch_closed_trades(&pool, portfolio_id).await {
        Ok(closed) => (
            StatusCode::OK,
            Json(SymbolAnalytics {
                symbols: summarize_by_symbol(&closed),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load closed trades: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_closed_trades(
    pool: &PgPool,
    portfolio_id: i64,
) -> Result<Vec<ClosedTrade>, sqlx::Error> {
    let query = r"
        SELECT id, symbol, COALESCE(profit_loss, 0) AS profit_loss
        FROM trades
        WHERE portfolio_id = $1 AND status = 'closed'
        ORDER BY id
    ";
    let rows = sqlx::query(query)
        .bind(portfolio_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| ClosedTrade {
            id: row.get("id"),
            symbol: row.get("symbol"),
            profit_loss: row.get("profit_loss"),
        })
        .collect())
}
