//! Feature runtime.
//!
//! A feature is a built-in optional module (blog, courses, forum, archive)
//! constructed once at process start from a static registration list.
//! Activation wires the feature's services and handlers into the host's
//! capability registries; deactivation unwires them. A feature never owns
//! what it creates: the registries do. The feature only installs and
//! removes references.

mod builtin;

pub use builtin::{
    ArchiveFeature, ArchiveService, BlogFeature, BlogService, CoursesFeature, CoursesService,
    ForumFeature, ForumService, builtin_features,
};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::host::Host;

/// Feature runtime errors.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The named feature is not in the registration list.
    #[error("unknown feature '{name}'")]
    UnknownFeature { name: String },

    /// A repository the feature requires is missing from the host.
    #[error("feature '{feature}': required repository '{repository}' is not wired into the host")]
    MissingDependency { feature: String, repository: String },

    /// The feature's handler exists but its service reference is cleared
    /// (the feature is deactivated).
    #[error("feature '{feature}': service unavailable")]
    ServiceUnavailable { feature: String },

    /// A wired collaborator failed while handling a request.
    #[error("feature '{feature}': {message}")]
    Internal { feature: String, message: String },
}

/// Lifecycle state of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    Registered,
    Active,
}

/// An HTTP-facing handler a feature publishes into the `handlers`
/// namespace. Handlers stay registered across deactivation but must answer
/// with a service-unavailable condition instead of panicking.
#[async_trait]
pub trait FeatureHandler: Send + Sync {
    async fn handle(&self) -> Result<String, FeatureError>;
}

/// A built-in optional module.
pub trait Feature: Send + Sync {
    /// Machine name, unique across the registration list.
    fn name(&self) -> &'static str;

    /// Repository keys that must be wired into the host before activation.
    fn required_repositories(&self) -> &'static [&'static str];

    /// Wire services and handlers into the host registries.
    ///
    /// Must be idempotent: a second activation re-wires dependencies (for
    /// example picking up a rotated collaborator) without duplicating
    /// state. Must be all-or-nothing: on error, no partial wiring remains
    /// observable.
    fn activate(&self, host: &Host) -> Result<(), FeatureError>;

    /// Clear handler service references and remove services from the
    /// registries. Never touches persisted data.
    fn deactivate(&self, host: &Host);

    /// The feature's registered handler, if activation ever ran.
    fn handler(&self, host: &Host) -> Option<Arc<dyn FeatureHandler>>;
}

/// Drives features through their lifecycle.
pub struct FeatureController {
    host: Arc<Host>,
    features: Vec<Arc<dyn Feature>>,
    /// Feature states, guarded by the admin-operations lock. Holding the
    /// lock across an entire activate/deactivate run serializes wiring so
    /// an in-flight request can never observe a half-wired feature.
    states: Mutex<HashMap<&'static str, FeatureState>>,
}

impl FeatureController {
    /// Build a controller over a static registration list.
    pub fn new(host: Arc<Host>, features: Vec<Arc<dyn Feature>>) -> Self {
        let states = features
            .iter()
            .map(|f| (f.name(), FeatureState::Registered))
            .collect();
        Self {
            host,
            features,
            states: Mutex::new(states),
        }
    }

    /// Build a controller with the built-in feature set.
    pub fn with_builtins(host: Arc<Host>) -> Self {
        Self::new(host, builtin_features())
    }

    /// The host features are activated against.
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    /// Activate a feature. Idempotent; fails without side effects when a
    /// required repository is missing.
    pub fn activate(&self, name: &str) -> Result<FeatureState, FeatureError> {
        let feature = self.find(name)?;
        let mut states = self.states.lock();

        for repository in feature.required_repositories() {
            if !self.host.has_repository(repository) {
                return Err(FeatureError::MissingDependency {
                    feature: feature.name().to_string(),
                    repository: (*repository).to_string(),
                });
            }
        }

        feature.activate(&self.host)?;
        states.insert(feature.name(), FeatureState::Active);
        info!(feature = %feature.name(), "feature activated");
        Ok(FeatureState::Active)
    }

    /// Deactivate a feature. A no-op for features that are not active.
    pub fn deactivate(&self, name: &str) -> Result<FeatureState, FeatureError> {
        let feature = self.find(name)?;
        let mut states = self.states.lock();

        if states.get(feature.name()) == Some(&FeatureState::Active) {
            feature.deactivate(&self.host);
            states.insert(feature.name(), FeatureState::Registered);
            info!(feature = %feature.name(), "feature deactivated");
        }
        Ok(FeatureState::Registered)
    }

    /// Activate every registered feature, logging failures. Used at boot;
    /// a feature whose dependencies are unwired stays registered.
    pub fn activate_all(&self) {
        let names: Vec<&'static str> = self.features.iter().map(|f| f.name()).collect();
        for name in names {
            if let Err(e) = self.activate(name) {
                warn!(feature = %name, error = %e, "feature not activated");
            }
        }
    }

    /// Current state of a feature.
    pub fn status(&self, name: &str) -> Option<FeatureState> {
        let feature = self.find(name).ok()?;
        self.states.lock().get(feature.name()).copied()
    }

    /// All features with their states, in registration order.
    pub fn list(&self) -> Vec<(String, FeatureState)> {
        let states = self.states.lock();
        self.features
            .iter()
            .map(|f| {
                let state = states
                    .get(f.name())
                    .copied()
                    .unwrap_or(FeatureState::Registered);
                (f.name().to_string(), state)
            })
            .collect()
    }

    /// Dispatch a request through a feature's registered handler.
    pub async fn dispatch(&self, name: &str) -> Result<String, FeatureError> {
        let feature = self.find(name)?;
        let handler = feature
            .handler(&self.host)
            .ok_or_else(|| FeatureError::ServiceUnavailable {
                feature: feature.name().to_string(),
            })?;
        handler.handle().await
    }

    fn find(&self, name: &str) -> Result<Arc<dyn Feature>, FeatureError> {
        self.features
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| FeatureError::UnknownFeature {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for FeatureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureController")
            .field("features", &self.features.len())
            .finish()
    }
}
