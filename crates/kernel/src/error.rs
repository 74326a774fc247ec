//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::feature::FeatureError;
use crate::plugin::PluginError;

/// Application errors.
///
/// The taxonomy matters to the HTTP layer: configuration errors (an unwired
/// manager or repository) are 503-class and distinct from 404-class
/// not-found errors, so administrators see "service unavailable" rather
/// than a misleading "not found".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // In development, include error details; in production, be vague
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

impl From<FeatureError> for AppError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::UnknownFeature { .. } => AppError::NotFound,
            FeatureError::MissingDependency { .. } | FeatureError::ServiceUnavailable { .. } => {
                AppError::Unavailable(err.to_string())
            }
            FeatureError::Internal { .. } => AppError::Internal(anyhow::anyhow!(err)),
        }
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::PluginNotFound { .. } => AppError::NotFound,
            PluginError::InvalidPackage { .. } | PluginError::AlreadyInstalled { .. } => {
                AppError::BadRequest(err.to_string())
            }
            PluginError::ManagerUnavailable | PluginError::RepositoryUnavailable => {
                AppError::Unavailable(err.to_string())
            }
            PluginError::Storage { .. } => AppError::Internal(anyhow::anyhow!(err)),
        }
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn feature_errors_map_to_http_classes() {
        let err: AppError = FeatureError::UnknownFeature {
            name: "nope".into(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound));

        let err: AppError = FeatureError::MissingDependency {
            feature: "courses".into(),
            repository: "courses".into(),
        }
        .into();
        assert!(matches!(err, AppError::Unavailable(_)));
    }

    #[test]
    fn plugin_errors_map_to_http_classes() {
        let err: AppError = PluginError::PluginNotFound {
            slug: "seo-slug".into(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound));

        let err: AppError = PluginError::InvalidPackage {
            details: "truncated gzip".into(),
        }
        .into();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err: AppError = PluginError::RepositoryUnavailable.into();
        assert!(matches!(err, AppError::Unavailable(_)));
    }
}
