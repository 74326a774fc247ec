//! HTTP route handlers.

pub mod features;
pub mod health;
pub mod plugins;
pub mod render;

use axum::Router;

use crate::state::AppState;

/// Combine every route group into the application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(features::router())
        .merge(plugins::router())
        .merge(render::router())
}
