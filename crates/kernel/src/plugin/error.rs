//! Plugin subsystem errors.

use thiserror::Error;

/// Errors from plugin installation and lifecycle management.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The uploaded archive is malformed or violates packaging rules.
    #[error("invalid plugin package: {details}")]
    InvalidPackage { details: String },

    /// A plugin with this slug is already installed.
    #[error("plugin '{slug}' is already installed")]
    AlreadyInstalled { slug: String },

    /// No installed plugin has this slug.
    #[error("plugin '{slug}' not found")]
    PluginNotFound { slug: String },

    /// The manager has no file store wired.
    #[error("plugin file manager not available")]
    ManagerUnavailable,

    /// The manager has no record repository wired.
    #[error("plugin repository not available")]
    RepositoryUnavailable,

    /// The underlying record store failed.
    #[error("plugin storage error: {message}")]
    Storage { message: String },
}

pub type PluginResult<T> = Result<T, PluginError>;
