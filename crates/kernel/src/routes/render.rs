//! Section rendering endpoints.
//!
//! Takes authored sections as JSON, runs them through the render registry,
//! and wraps the result in the active theme's page template. Unknown
//! section types and renderer panics degrade to warnings, never failures.

use axum::extract::State;
use axum::response::Html;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::render::{RenderContext, RenderWarning, Section, render_toc};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RenderRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Serialize)]
struct TocResponse {
    html: String,
}

/// Render a page of sections through the active theme.
///
/// POST /render
async fn render_page(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> AppResult<Html<String>> {
    let host = state.host();
    let ctx = RenderContext {
        sanitizer: host.sanitizer(),
        services: host.render_services().as_ref(),
        registry: state.renderer(),
    };

    let output = state.renderer().render_page(&ctx, &request.sections);
    log_warnings(&output.warnings);

    let page = host
        .themes()
        .render_page(&request.title, &output.html)
        .map_err(crate::error::AppError::Internal)?;
    Ok(Html(page))
}

/// Render only the table of contents for a set of sections.
///
/// POST /render/toc
async fn render_page_toc(Json(request): Json<RenderRequest>) -> Json<TocResponse> {
    Json(TocResponse {
        html: render_toc(&request.sections),
    })
}

fn log_warnings(warnings: &[RenderWarning]) {
    for warning in warnings {
        tracing::warn!(item = %warning.item_id, message = %warning.message, "render warning");
    }
}

/// Create the render router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/render", post(render_page))
        .route("/render/toc", post(render_page_toc))
}
