pub(crate) mod analytics;
pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod portfolios;
pub(crate) mod root;
pub(crate) mod trades;
pub(crate) mod users;

pub use auth::{AuthConfig, AuthState};

// Common helpers for the handlers.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;

/// Uniform error body: `{"detail": "..."}`.
pub(crate) fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_sets_status() {
        let response = detail(StatusCode::FORBIDDEN, "nope");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
