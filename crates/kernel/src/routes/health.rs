//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_theme: String,
    /// Set when the last theme reload failed and a stale template set is
    /// being served.
    theme_reload_error: Option<String>,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let themes = state.host().themes();
    Json(HealthResponse {
        status: "ok",
        active_theme: themes.active_theme(),
        theme_reload_error: themes.last_reload_error(),
    })
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
