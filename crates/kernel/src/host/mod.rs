//! Host facade.
//!
//! The single object a feature is given at activation time. The host is
//! constructed once at boot and is immutable in shape: its accessors never
//! change, though the repositories they resolve may be swapped across a
//! feature's activate/deactivate cycle.

mod cache;
mod sanitize;
mod scheduler;

pub use cache::CacheService;
pub use sanitize::Sanitizer;
pub use scheduler::Scheduler;

use std::sync::Arc;

use crate::config::Config;
use crate::registry::{CapabilityRegistry, ns};
use crate::render::ServiceBindings;
use crate::repo::{Course, ForumThread, Lesson, PluginRepository, Post, Repository};
use crate::theme::ThemeManager;

/// Shared infrastructure facade for features.
pub struct Host {
    config: Config,
    cache: CacheService,
    scheduler: Scheduler,
    sanitizer: Sanitizer,
    themes: Arc<ThemeManager>,
    registry: CapabilityRegistry,
    render_services: Arc<ServiceBindings>,
}

impl Host {
    /// Start building a host for the given configuration.
    pub fn builder(config: Config) -> HostBuilder {
        HostBuilder {
            config,
            themes: None,
            repositories: Vec::new(),
        }
    }

    /// Process-wide configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared cache.
    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Background scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// HTML sanitizer.
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Theme manager and active-theme resolver.
    pub fn themes(&self) -> &Arc<ThemeManager> {
        &self.themes
    }

    /// The capability registries features publish into.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Service references exposed to the rendering pipeline.
    pub fn render_services(&self) -> &Arc<ServiceBindings> {
        &self.render_services
    }

    /// Resolve a repository from the `repositories` namespace.
    pub fn repository<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<dyn Repository<T>>> {
        self.registry
            .get_as::<Arc<dyn Repository<T>>>(ns::REPOSITORIES, key)
            .map(|repo| (*repo).clone())
    }

    /// Whether a repository is wired under the given key.
    pub fn has_repository(&self, key: &str) -> bool {
        self.registry.contains(ns::REPOSITORIES, key)
    }

    /// Install or replace a repository. Used at boot and when a collaborator
    /// rotates (e.g. credentials change and a new client is constructed).
    pub fn install_repository<T: Send + Sync + 'static>(
        &self,
        key: &str,
        repository: Arc<dyn Repository<T>>,
    ) {
        self.registry.set(ns::REPOSITORIES, key, Arc::new(repository));
    }

    pub fn post_repository(&self) -> Option<Arc<dyn Repository<Post>>> {
        self.repository::<Post>(repo_keys::POSTS)
    }

    pub fn course_repository(&self) -> Option<Arc<dyn Repository<Course>>> {
        self.repository::<Course>(repo_keys::COURSES)
    }

    pub fn lesson_repository(&self) -> Option<Arc<dyn Repository<Lesson>>> {
        self.repository::<Lesson>(repo_keys::LESSONS)
    }

    pub fn thread_repository(&self) -> Option<Arc<dyn Repository<ForumThread>>> {
        self.repository::<ForumThread>(repo_keys::THREADS)
    }

    /// Resolve the plugin record repository, if one is wired.
    pub fn plugin_repository(&self) -> Option<Arc<dyn PluginRepository>> {
        self.registry
            .get_as::<Arc<dyn PluginRepository>>(ns::REPOSITORIES, repo_keys::PLUGINS)
            .map(|repo| (*repo).clone())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Well-known repository keys.
pub mod repo_keys {
    pub const POSTS: &str = "posts";
    pub const COURSES: &str = "courses";
    pub const LESSONS: &str = "lessons";
    pub const THREADS: &str = "threads";
    pub const PLUGINS: &str = "plugins";
}

/// Builder for [`Host`]. Tests construct isolated hosts per test; the
/// binary constructs exactly one at boot.
pub struct HostBuilder {
    config: Config,
    themes: Option<Arc<ThemeManager>>,
    repositories: Vec<Box<dyn FnOnce(&CapabilityRegistry) + Send>>,
}

impl HostBuilder {
    /// Use the given theme manager.
    pub fn themes(mut self, themes: Arc<ThemeManager>) -> Self {
        self.themes = Some(themes);
        self
    }

    /// Wire a repository under a well-known key.
    pub fn repository<T: Send + Sync + 'static>(
        mut self,
        key: &str,
        repository: Arc<dyn Repository<T>>,
    ) -> Self {
        let key = key.to_string();
        self.repositories.push(Box::new(move |registry| {
            registry.set(ns::REPOSITORIES, &key, Arc::new(repository));
        }));
        self
    }

    /// Wire the plugin record repository.
    pub fn plugin_repository(mut self, repository: Arc<dyn PluginRepository>) -> Self {
        self.repositories.push(Box::new(move |registry| {
            registry.set(ns::REPOSITORIES, repo_keys::PLUGINS, Arc::new(repository));
        }));
        self
    }

    /// Construct the host.
    pub fn build(self) -> Arc<Host> {
        let registry = CapabilityRegistry::new();
        for install in self.repositories {
            install(&registry);
        }

        let themes = self
            .themes
            .unwrap_or_else(|| Arc::new(ThemeManager::empty()));

        Arc::new(Host {
            config: self.config,
            cache: CacheService::new(),
            scheduler: Scheduler::new(),
            sanitizer: Sanitizer::new(),
            themes,
            registry,
            render_services: Arc::new(ServiceBindings::new()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryRepository;

    #[test]
    fn builder_wires_repositories() {
        let host = Host::builder(Config::default())
            .repository::<Post>(repo_keys::POSTS, Arc::new(MemoryRepository::new()))
            .build();

        assert!(host.has_repository(repo_keys::POSTS));
        assert!(host.post_repository().is_some());
        assert!(!host.has_repository(repo_keys::COURSES));
        assert!(host.course_repository().is_none());
    }

    #[test]
    fn install_repository_replaces_in_place() {
        let host = Host::builder(Config::default()).build();
        assert!(host.post_repository().is_none());

        host.install_repository::<Post>(repo_keys::POSTS, Arc::new(MemoryRepository::new()));
        assert!(host.post_repository().is_some());
    }
}
