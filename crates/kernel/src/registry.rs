//! Capability registries.
//!
//! A capability registry is a per-namespace key/value store that lets a
//! feature publish a service or handler without the host knowing its
//! concrete type. Values are opaque; callers agree on the expected type by
//! convention per key. Retrieving the wrong type is a programming error and
//! yields `None`, never a reportable runtime error.
//!
//! Last writer wins. Readers must tolerate absence because activation order
//! across features is not guaranteed. Deactivation always removes the key
//! entirely; a present-but-empty value is never used as an uninstall signal.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Well-known registry namespaces.
pub mod ns {
    /// Services published by features (e.g. the blog service).
    pub const SERVICES: &str = "services";
    /// HTTP handlers published by features.
    pub const HANDLERS: &str = "handlers";
    /// Repositories wired in by the host at boot.
    pub const REPOSITORIES: &str = "repositories";
}

type Value = Arc<dyn Any + Send + Sync>;

/// Namespaced store of opaque capabilities.
///
/// Uses `parking_lot::RwLock` rather than `std::sync::RwLock` because:
/// - No poisoning: a panic in a writer won't permanently wedge every reader.
/// - Writes only happen during activate/deactivate; reads happen on every
///   request, so the read path must stay cheap.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value stored under `(namespace, key)`.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.entries
            .read()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// Get a value and downcast it to `T`.
    ///
    /// Returns `None` when the key is absent or holds a different type.
    pub fn get_as<T: Send + Sync + 'static>(&self, namespace: &str, key: &str) -> Option<Arc<T>> {
        self.get(namespace, key).and_then(|v| v.downcast::<T>().ok())
    }

    /// Store a value under `(namespace, key)`, replacing any prior value.
    pub fn set<T: Send + Sync + 'static>(&self, namespace: &str, key: &str, value: Arc<T>) {
        self.entries
            .write()
            .insert((namespace.to_string(), key.to_string()), value);
    }

    /// Remove the key entirely. Returns true if a value was present.
    pub fn remove(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .write()
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some()
    }

    /// Whether a value is stored under `(namespace, key)`.
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .read()
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    /// Keys currently present in a namespace, sorted.
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
