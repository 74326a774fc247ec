//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::feature::FeatureController;
use crate::host::{Host, repo_keys};
use crate::plugin::{LocalPluginFiles, PluginManager};
use crate::render::RenderRegistry;
use crate::repo::memory::{MemoryPluginRepository, shared};
use crate::repo::{Course, ForumThread, Lesson, Post, Repository};
use crate::theme::ThemeManager;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// The platform facade features and renderers work against.
    host: Arc<Host>,

    /// Feature lifecycle controller.
    features: FeatureController,

    /// Plugin installation and lifecycle.
    plugins: PluginManager,

    /// Section and element renderers.
    renderer: RenderRegistry,
}

impl AppState {
    /// Build the full application state from configuration.
    ///
    /// Wires in-memory repositories, discovers themes on disk, registers
    /// the built-in renderers, and activates every built-in feature whose
    /// repositories are present.
    pub fn new(config: Config) -> Result<Self> {
        let themes = ThemeManager::discover(&config.themes_dir, &config.default_theme)
            .with_context(|| {
                format!("failed to discover themes in {}", config.themes_dir.display())
            })?;
        info!(
            themes = themes.list().len(),
            active = %themes.active_theme(),
            "themes discovered"
        );

        let plugin_repository = Arc::new(MemoryPluginRepository::new());
        let plugin_files = Arc::new(LocalPluginFiles::new(config.plugins_dir.clone()));

        let posts: Arc<dyn Repository<Post>> = shared::<Post>();
        let courses: Arc<dyn Repository<Course>> = shared::<Course>();
        let lessons: Arc<dyn Repository<Lesson>> = shared::<Lesson>();
        let threads: Arc<dyn Repository<ForumThread>> = shared::<ForumThread>();

        let host = Host::builder(config)
            .themes(Arc::new(themes))
            .repository(repo_keys::POSTS, posts)
            .repository(repo_keys::COURSES, courses)
            .repository(repo_keys::LESSONS, lessons)
            .repository(repo_keys::THREADS, threads)
            .plugin_repository(plugin_repository.clone())
            .build();

        let features = FeatureController::with_builtins(Arc::clone(&host));
        features.activate_all();

        let plugins = PluginManager::new(plugin_repository, plugin_files);
        let renderer = RenderRegistry::with_builtins();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                host,
                features,
                plugins,
                renderer,
            }),
        })
    }

    pub fn host(&self) -> &Arc<Host> {
        &self.inner.host
    }

    pub fn features(&self) -> &FeatureController {
        &self.inner.features
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.inner.plugins
    }

    pub fn renderer(&self) -> &RenderRegistry {
        &self.inner.renderer
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::feature::FeatureState;

    #[test]
    fn new_activates_builtin_features() {
        let tmp = tempfile::tempdir().unwrap();
        verso_test_utils::themes::write_theme(tmp.path(), "default", "{{ content | safe }}");

        let config = Config {
            themes_dir: tmp.path().to_path_buf(),
            plugins_dir: tmp.path().join("plugins"),
            ..Config::default()
        };

        let state = AppState::new(config).unwrap();
        assert_eq!(state.features().status("blog"), Some(FeatureState::Active));
        assert_eq!(state.features().status("courses"), Some(FeatureState::Active));
    }

    #[test]
    fn clone_shares_the_same_host() {
        let tmp = tempfile::tempdir().unwrap();
        verso_test_utils::themes::write_theme(tmp.path(), "default", "{{ content | safe }}");

        let config = Config {
            themes_dir: tmp.path().to_path_buf(),
            plugins_dir: tmp.path().join("plugins"),
            ..Config::default()
        };

        let state = AppState::new(config).unwrap();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(state.host(), cloned.host()));
    }
}
