//! Admin routes for feature lifecycle and feature request dispatch.

use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::feature::FeatureState;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct FeatureView {
    name: String,
    state: FeatureState,
}

/// List features in registration order with their lifecycle state.
///
/// GET /admin/features
async fn list_features(State(state): State<AppState>) -> Json<Vec<FeatureView>> {
    let features = state
        .features()
        .list()
        .into_iter()
        .map(|(name, feature_state)| FeatureView {
            name,
            state: feature_state,
        })
        .collect();
    Json(features)
}

/// Activate a feature.
///
/// POST /admin/features/{name}/activate
async fn activate_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<FeatureState>> {
    Ok(Json(state.features().activate(&name)?))
}

/// Deactivate a feature. Its routes remain registered but answer 503.
///
/// POST /admin/features/{name}/deactivate
async fn deactivate_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<FeatureState>> {
    Ok(Json(state.features().deactivate(&name)?))
}

/// Dispatch a request to a feature's handler.
///
/// GET /f/{name}
async fn dispatch_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Html<String>> {
    let fragment = state.features().dispatch(&name).await?;
    Ok(Html(fragment))
}

/// Create the feature router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/features", get(list_features))
        .route("/admin/features/{name}/activate", post(activate_feature))
        .route("/admin/features/{name}/deactivate", post(deactivate_feature))
        .route("/f/{name}", get(dispatch_feature))
}
