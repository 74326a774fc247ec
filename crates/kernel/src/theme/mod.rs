//! Theme-aware template management.
//!
//! Owns the parsed Tera template set for the active theme. Every render
//! clones the stored set before executing content into it: binding values
//! mutates the engine's named-template table, and two requests sharing one
//! set would corrupt each other's output. Theme switches invalidate the
//! cache lazily: the next render notices the slug mismatch and reloads
//! under the write lock while other renders wait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use tera::Tera;
use tracing::{debug, info, warn};

/// Baseline page template used when a theme ships no `page.html` (or no
/// theme is installed at all).
const BASELINE_PAGE: &str = "<!doctype html>\n<html>\n<head><title>{{ title }}</title></head>\n<body>{{ content | safe }}</body>\n</html>\n";

/// Theme manifest (`theme.info.toml` in the theme directory).
#[derive(Debug, Clone, Deserialize)]
pub struct ThemeInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// An installed theme.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Directory name; unique key for activation.
    pub slug: String,
    pub info: ThemeInfo,
    pub templates_dir: PathBuf,
}

struct LoadedTemplates {
    tera: Tera,
    slug: String,
}

/// Manager for the active theme and its parsed template set.
pub struct ThemeManager {
    themes: RwLock<HashMap<String, Theme>>,
    active: RwLock<String>,
    cache: RwLock<Option<LoadedTemplates>>,
    last_reload_error: RwLock<Option<String>>,
}

impl ThemeManager {
    /// Discover themes under `themes_dir` and select `default_slug` as the
    /// active theme. A missing or empty directory is not an error: the
    /// manager falls back to the baseline template set.
    pub fn discover(themes_dir: &Path, default_slug: &str) -> Result<Self> {
        let mut themes = HashMap::new();

        if themes_dir.is_dir() {
            for entry in std::fs::read_dir(themes_dir)
                .with_context(|| format!("failed to read themes dir {}", themes_dir.display()))?
            {
                let entry = entry?;
                let dir = entry.path();
                if !dir.is_dir() {
                    continue;
                }
                let manifest = dir.join("theme.info.toml");
                if !manifest.is_file() {
                    continue;
                }

                let slug = entry.file_name().to_string_lossy().to_string();
                let content = std::fs::read_to_string(&manifest)
                    .with_context(|| format!("failed to read {}", manifest.display()))?;
                let info: ThemeInfo = toml::from_str(&content)
                    .with_context(|| format!("failed to parse {}", manifest.display()))?;

                debug!(theme = %slug, version = %info.version, "discovered theme");
                themes.insert(
                    slug.clone(),
                    Theme {
                        slug,
                        info,
                        templates_dir: dir,
                    },
                );
            }
        }

        info!(count = themes.len(), active = %default_slug, "themes loaded");

        Ok(Self {
            themes: RwLock::new(themes),
            active: RwLock::new(default_slug.to_string()),
            cache: RwLock::new(None),
            last_reload_error: RwLock::new(None),
        })
    }

    /// A manager with no installed themes, serving the baseline template
    /// set. Used by tests and by hosts constructed without a themes dir.
    pub fn empty() -> Self {
        Self {
            themes: RwLock::new(HashMap::new()),
            active: RwLock::new("default".to_string()),
            cache: RwLock::new(None),
            last_reload_error: RwLock::new(None),
        }
    }

    /// Installed themes, sorted by slug.
    pub fn list(&self) -> Vec<Theme> {
        let mut themes: Vec<Theme> = self.themes.read().values().cloned().collect();
        themes.sort_by(|a, b| a.slug.cmp(&b.slug));
        themes
    }

    /// Slug of the active theme.
    pub fn active_theme(&self) -> String {
        self.active.read().clone()
    }

    /// Switch the active theme. The cached template set is not rebuilt
    /// here; the next render reloads lazily.
    pub fn set_active(&self, slug: &str) -> Result<()> {
        if !self.themes.read().contains_key(slug) {
            anyhow::bail!("unknown theme '{slug}'");
        }
        *self.active.write() = slug.to_string();
        info!(theme = %slug, "active theme switched");
        Ok(())
    }

    /// Error from the most recent failed template reload, if any.
    pub fn last_reload_error(&self) -> Option<String> {
        self.last_reload_error.read().clone()
    }

    /// Clone the active theme's template set for one render.
    ///
    /// The common path takes the read lock and clones. When the active slug
    /// differs from the cached one (or nothing is cached yet), the template
    /// set is rebuilt synchronously under the write lock. A failed rebuild
    /// keeps the previous good set: stale-but-available beats down. The
    /// error is recorded for operators and retried on the next render.
    pub fn templates_for_render(&self) -> Result<Tera> {
        let active = self.active_theme();

        {
            let cache = self.cache.read();
            if let Some(loaded) = cache.as_ref() {
                if loaded.slug == active {
                    return Ok(loaded.tera.clone());
                }
            }
        }

        let mut cache = self.cache.write();
        // Another writer may have reloaded while this one waited.
        let active = self.active_theme();
        if let Some(loaded) = cache.as_ref() {
            if loaded.slug == active {
                return Ok(loaded.tera.clone());
            }
        }

        match self.load_templates(&active) {
            Ok(tera) => {
                *self.last_reload_error.write() = None;
                let clone = tera.clone();
                *cache = Some(LoadedTemplates { tera, slug: active });
                Ok(clone)
            }
            Err(e) => {
                *self.last_reload_error.write() = Some(e.to_string());
                match cache.as_ref() {
                    Some(stale) => {
                        warn!(theme = %active, error = %e, "template reload failed, serving previous set");
                        Ok(stale.tera.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Render a full page through the active theme's `page.html`.
    pub fn render_page(&self, title: &str, content: &str) -> Result<String> {
        let tera = self.templates_for_render()?;

        let mut context = tera::Context::new();
        context.insert("title", title);
        context.insert("content", content);

        tera.render("page.html", &context)
            .context("failed to render page template")
    }

    /// Build the template set for a theme slug.
    fn load_templates(&self, slug: &str) -> Result<Tera> {
        let theme = self.themes.read().get(slug).cloned();

        let mut tera = match theme {
            Some(theme) => {
                let pattern = theme.templates_dir.join("**/*.html");
                let pattern_str = pattern.to_str().context("invalid theme directory path")?;
                Tera::new(pattern_str)
                    .with_context(|| format!("failed to parse templates for theme '{slug}'"))?
            }
            None => {
                debug!(theme = %slug, "theme not installed, using baseline templates");
                Tera::default()
            }
        };

        if tera.get_template("page.html").is_err() {
            tera.add_raw_template("page.html", BASELINE_PAGE)
                .context("failed to register baseline page template")?;
        }

        let count = tera.get_template_names().count();
        debug!(theme = %slug, count, "templates loaded");
        Ok(tera)
    }
}

impl std::fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeManager")
            .field("themes", &self.themes.read().len())
            .field("active", &self.active_theme())
            .finish()
    }
}
