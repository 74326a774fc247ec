//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Path to themes directory (default: ./themes).
    pub themes_dir: PathBuf,

    /// Path to the directory installed plugin packages are extracted into
    /// (default: ./plugins).
    pub plugins_dir: PathBuf,

    /// Slug of the theme to activate at boot (default: "default").
    pub default_theme: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let themes_dir = env::var("THEMES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./themes"));

        let plugins_dir = env::var("PLUGINS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./plugins"));

        let default_theme = env::var("DEFAULT_THEME").unwrap_or_else(|_| "default".to_string());

        Ok(Self {
            port,
            themes_dir,
            plugins_dir,
            default_theme,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            themes_dir: PathBuf::from("./themes"),
            plugins_dir: PathBuf::from("./plugins"),
            default_theme: "default".to_string(),
        }
    }
}
