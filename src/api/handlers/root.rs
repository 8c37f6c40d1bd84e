use axum::response::{IntoResponse, Json};
use serde_json::json;

// axum handler for the service root
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Trade Journal API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}
