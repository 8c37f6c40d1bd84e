use super::handlers::{analytics, auth, health, portfolios, trades, users};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Routes added outside (like
/// `/` or `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::me::me))
        .routes(routes!(users::list_users))
        .routes(routes!(
            users::get_user,
            users::update_user,
            users::delete_user
        ))
        .routes(routes!(
            portfolios::list_portfolios,
            portfolios::create_portfolio
        ))
        .routes(routes!(
            portfolios::get_portfolio,
            portfolios::update_portfolio,
            portfolios::delete_portfolio
        ))
        .routes(routes!(trades::list_portfolio_trades))
        .routes(routes!(trades::create_trade))
        .routes(routes!(
            trades::get_trade,
            trades::update_trade,
            trades::delete_trade
        ))
        .routes(routes!(trades::close_trade))
        .routes(routes!(analytics::portfolio_analytics))
        .routes(routes!(analytics::portfolio_analytics_by_symbol));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, and bearer tokens".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Administrative account management".to_string());

    let mut portfolios_tag = Tag::new("portfolios");
    portfolios_tag.description = Some("Portfolio management".to_string());

    let mut trades_tag = Tag::new("trades");
    trades_tag.description = Some("Trade journal entries".to_string());

    let mut analytics_tag = Tag::new("analytics");
    analytics_tag.description = Some("Profit/loss summaries".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![
            auth_tag,
            users_tag,
            portfolios_tag,
            trades_tag,
            analytics_tag,
        ]))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );
    }

    #[test]
    fn documented_paths_include_the_core_routes() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/api/auth/register"));
        assert!(paths.contains_key("/api/auth/login"));
        assert!(paths.contains_key("/api/auth/me"));
        assert!(paths.contains_key("/api/users"));
        assert!(paths.contains_key("/api/portfolios"));
        assert!(paths.contains_key("/api/trades/{trade_id}/close"));
        assert!(paths.contains_key("/api/analytics/portfolio/{portfolio_id}"));
    }
}
