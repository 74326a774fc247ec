//! Admin routes for plugin management.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::plugin::PluginRecord;
use crate::state::AppState;

/// Public projection of an installed plugin.
#[derive(Debug, Serialize)]
struct PluginView {
    slug: String,
    name: String,
    version: String,
    description: Option<String>,
    active: bool,
    installed_at: DateTime<Utc>,
    last_activated_at: Option<DateTime<Utc>>,
}

impl From<PluginRecord> for PluginView {
    fn from(record: PluginRecord) -> Self {
        Self {
            slug: record.slug,
            name: record.name,
            version: record.version,
            description: record.description,
            active: record.active,
            installed_at: record.installed_at,
            last_activated_at: record.last_activated_at,
        }
    }
}

/// List installed plugins.
///
/// GET /admin/plugins
async fn list_plugins(State(state): State<AppState>) -> AppResult<Json<Vec<PluginView>>> {
    let records = state.plugins().list().await?;
    Ok(Json(records.into_iter().map(PluginView::from).collect()))
}

#[derive(Debug, Deserialize)]
struct InstallQuery {
    /// Original upload filename, for logs only. The manifest inside the
    /// archive is the authority on plugin identity.
    filename: Option<String>,
}

/// Install a plugin from an uploaded archive.
///
/// POST /admin/plugins?filename=seo-tools.tar.gz
async fn install_plugin(
    State(state): State<AppState>,
    Query(query): Query<InstallQuery>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<PluginView>)> {
    if let Some(filename) = query.filename.as_deref() {
        tracing::debug!(filename, size = body.len(), "plugin upload received");
    }
    let record = state.plugins().install(&body).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Activate an installed plugin.
///
/// POST /admin/plugins/{slug}/activate
async fn activate_plugin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PluginView>> {
    let record = state.plugins().activate(&slug).await?;
    Ok(Json(record.into()))
}

/// Deactivate an installed plugin.
///
/// POST /admin/plugins/{slug}/deactivate
async fn deactivate_plugin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PluginView>> {
    let record = state.plugins().deactivate(&slug).await?;
    Ok(Json(record.into()))
}

/// Delete a plugin, its files, and its record.
///
/// DELETE /admin/plugins/{slug}
async fn delete_plugin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.plugins().delete(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the plugin admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/plugins", get(list_plugins).post(install_plugin))
        .route("/admin/plugins/{slug}/activate", post(activate_plugin))
        .route("/admin/plugins/{slug}/deactivate", post(deactivate_plugin))
        .route("/admin/plugins/{slug}", delete(delete_plugin))
}
