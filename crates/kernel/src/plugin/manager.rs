//! Plugin lifecycle management.
//!
//! The manager owns the install/activate/deactivate/delete flow over two
//! seams: a [`PluginRepository`] for records and a [`PluginFileManager`] for
//! extracted archives. Either seam may be left unwired, in which case
//! operations that need it fail with an unavailable-class error rather than
//! a not-found one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{PluginError, PluginResult};
use super::package::{PluginFileManager, read_manifest};
use crate::repo::{PluginRepository, RepoError};

/// An installed plugin as persisted by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRecord {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub homepage: Option<String>,
    pub active: bool,
    pub installed_at: DateTime<Utc>,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

/// Coordinates plugin installation and lifecycle.
pub struct PluginManager {
    repository: Option<Arc<dyn PluginRepository>>,
    files: Option<Arc<dyn PluginFileManager>>,
}

impl PluginManager {
    pub fn new(
        repository: Arc<dyn PluginRepository>,
        files: Arc<dyn PluginFileManager>,
    ) -> Self {
        Self {
            repository: Some(repository),
            files: Some(files),
        }
    }

    /// A manager with nothing wired. Every operation reports which seam is
    /// missing instead of panicking.
    pub fn unwired() -> Self {
        Self {
            repository: None,
            files: None,
        }
    }

    fn repository(&self) -> PluginResult<&Arc<dyn PluginRepository>> {
        self.repository
            .as_ref()
            .ok_or(PluginError::RepositoryUnavailable)
    }

    fn files(&self) -> PluginResult<&Arc<dyn PluginFileManager>> {
        self.files.as_ref().ok_or(PluginError::ManagerUnavailable)
    }

    /// All installed plugins, sorted by slug.
    pub async fn list(&self) -> PluginResult<Vec<PluginRecord>> {
        self.repository()?
            .list()
            .await
            .map_err(|e| storage(&e))
    }

    /// A single plugin record by slug.
    pub async fn get(&self, slug: &str) -> PluginResult<PluginRecord> {
        self.repository()?
            .get(slug)
            .await
            .map_err(|e| not_found_or_storage(slug, e))
    }

    /// Install a plugin from an uploaded archive.
    ///
    /// The manifest inside the archive is the authority on identity; the
    /// record is created inactive.
    pub async fn install(&self, data: &[u8]) -> PluginResult<PluginRecord> {
        let repository = self.repository()?;
        let files = self.files()?;

        let info = read_manifest(data)?;

        if repository.get(&info.slug).await.is_ok() {
            return Err(PluginError::AlreadyInstalled { slug: info.slug });
        }

        files.extract(data, &info.slug)?;

        let record = PluginRecord {
            slug: info.slug.clone(),
            name: info.name,
            version: info.version,
            description: info.description,
            author: info.author,
            homepage: info.homepage,
            active: false,
            installed_at: Utc::now(),
            last_activated_at: None,
            metadata: info.metadata,
        };

        match repository.insert(record.clone()).await {
            Ok(()) => {
                tracing::info!(slug = %record.slug, version = %record.version, "plugin installed");
                Ok(record)
            }
            Err(RepoError::Conflict(slug)) => {
                // Lost a race to a concurrent install; undo the extraction.
                let _ = files.remove(&slug);
                Err(PluginError::AlreadyInstalled { slug })
            }
            Err(e) => Err(storage(&e)),
        }
    }

    /// Mark a plugin active. Idempotent.
    pub async fn activate(&self, slug: &str) -> PluginResult<PluginRecord> {
        let repository = self.repository()?;
        let mut record = repository
            .get(slug)
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;

        if record.active {
            return Ok(record);
        }

        record.active = true;
        record.last_activated_at = Some(Utc::now());
        repository
            .update(record.clone())
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;
        tracing::info!(slug = %record.slug, "plugin activated");
        Ok(record)
    }

    /// Mark a plugin inactive. Idempotent.
    pub async fn deactivate(&self, slug: &str) -> PluginResult<PluginRecord> {
        let repository = self.repository()?;
        let mut record = repository
            .get(slug)
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;

        if !record.active {
            return Ok(record);
        }

        record.active = false;
        repository
            .update(record.clone())
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;
        tracing::info!(slug = %record.slug, "plugin deactivated");
        Ok(record)
    }

    /// Remove a plugin entirely: deactivate if active, delete its files,
    /// then drop its record.
    pub async fn delete(&self, slug: &str) -> PluginResult<()> {
        let repository = self.repository()?;
        let files = self.files()?;

        let record = repository
            .get(slug)
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;

        if record.active {
            self.deactivate(slug).await?;
        }

        files.remove(slug)?;
        repository
            .remove(slug)
            .await
            .map_err(|e| not_found_or_storage(slug, e))?;
        tracing::info!(slug, "plugin deleted");
        Ok(())
    }
}

fn storage(err: &RepoError) -> PluginError {
    PluginError::Storage {
        message: err.to_string(),
    }
}

fn not_found_or_storage(slug: &str, err: RepoError) -> PluginError {
    match err {
        RepoError::NotFound => PluginError::PluginNotFound {
            slug: slug.to_string(),
        },
        other => storage(&other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::plugin::package::LocalPluginFiles;
    use crate::repo::memory::MemoryPluginRepository;
    use verso_test_utils::{garbage_archive, plugin_archive};

    fn manager(tmp: &tempfile::TempDir) -> PluginManager {
        PluginManager::new(
            Arc::new(MemoryPluginRepository::new()),
            Arc::new(LocalPluginFiles::new(tmp.path())),
        )
    }

    #[tokio::test]
    async fn install_creates_inactive_record_from_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        let record = manager
            .install(&plugin_archive("seo-tools", "1.2.0"))
            .await
            .unwrap();

        assert_eq!(record.slug, "seo-tools");
        assert_eq!(record.version, "1.2.0");
        assert!(!record.active);
        assert!(record.last_activated_at.is_none());
        assert!(tmp.path().join("seo-tools").join("seo-tools.info.toml").exists());
    }

    #[tokio::test]
    async fn install_rejects_duplicate_slug() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        manager
            .install(&plugin_archive("seo-tools", "1.0.0"))
            .await
            .unwrap();
        let err = manager
            .install(&plugin_archive("seo-tools", "2.0.0"))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::AlreadyInstalled { .. }));
    }

    #[tokio::test]
    async fn install_rejects_invalid_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        let err = manager.install(&garbage_archive()).await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidPackage { .. }));
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activate_stamps_timestamp_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        manager
            .install(&plugin_archive("seo-tools", "1.0.0"))
            .await
            .unwrap();

        let record = manager.activate("seo-tools").await.unwrap();
        assert!(record.active);
        let stamped = record.last_activated_at.unwrap();

        let again = manager.activate("seo-tools").await.unwrap();
        assert_eq!(again.last_activated_at.unwrap(), stamped);
    }

    #[tokio::test]
    async fn deactivate_clears_active_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        manager
            .install(&plugin_archive("seo-tools", "1.0.0"))
            .await
            .unwrap();
        manager.activate("seo-tools").await.unwrap();

        let record = manager.deactivate("seo-tools").await.unwrap();
        assert!(!record.active);
        // The activation timestamp is history, not state.
        assert!(record.last_activated_at.is_some());
    }

    #[tokio::test]
    async fn delete_removes_files_and_record() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        manager
            .install(&plugin_archive("seo-tools", "1.0.0"))
            .await
            .unwrap();
        manager.activate("seo-tools").await.unwrap();

        manager.delete("seo-tools").await.unwrap();

        assert!(!tmp.path().join("seo-tools").exists());
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_slug_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager(&tmp);

        let err = manager.delete("never-installed").await.unwrap_err();
        assert!(matches!(err, PluginError::PluginNotFound { .. }));
    }

    #[tokio::test]
    async fn unwired_manager_reports_unavailable() {
        let manager = PluginManager::unwired();

        let err = manager.list().await.unwrap_err();
        assert!(matches!(err, PluginError::RepositoryUnavailable));

        let err = manager
            .install(&plugin_archive("seo-tools", "1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::RepositoryUnavailable));
    }
}
