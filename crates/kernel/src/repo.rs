//! Repository contracts.
//!
//! Persistence is an external collaborator: the kernel consumes it through
//! these narrow traits and never sees a schema or a query. `RepoError::NotFound`
//! is the sentinel callers match on to distinguish absence from failure.
//!
//! The `memory` module provides in-process implementations. They are the
//! default wiring for the standalone binary and for tests; deployments with
//! durable storage supply their own implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::plugin::PluginRecord;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,

    /// An entity with the same key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// An entity with a stable identity.
pub trait Entity {
    fn id(&self) -> Uuid;
}

/// CRUD-shaped contract over a single entity type.
#[async_trait]
pub trait Repository<T>: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<T, RepoError>;
    async fn get_all(&self) -> Result<Vec<T>, RepoError>;
    async fn create(&self, entity: T) -> Result<T, RepoError>;
    async fn update(&self, entity: T) -> Result<T, RepoError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
}

/// Persistence contract for installed plugin records, keyed by slug.
#[async_trait]
pub trait PluginRepository: Send + Sync {
    async fn get(&self, slug: &str) -> Result<PluginRecord, RepoError>;
    async fn list(&self) -> Result<Vec<PluginRecord>, RepoError>;
    async fn insert(&self, record: PluginRecord) -> Result<(), RepoError>;
    async fn update(&self, record: PluginRecord) -> Result<(), RepoError>;
    async fn remove(&self, slug: &str) -> Result<(), RepoError>;
}

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Unix timestamp of publication; unpublished posts carry 0.
    pub published: i64,
}

impl Entity for Post {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
}

impl Entity for Course {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A lesson within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub order: i32,
}

impl Entity for Lesson {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A forum thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumThread {
    pub id: Uuid,
    pub title: String,
    pub replies: u32,
    /// Unix timestamp of the last reply (or creation).
    pub updated: i64,
}

impl Entity for ForumThread {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// In-memory repository implementations.
pub mod memory {
    use super::*;

    /// In-memory `Repository<T>` backed by a `HashMap`.
    #[derive(Default)]
    pub struct MemoryRepository<T> {
        entities: RwLock<HashMap<Uuid, T>>,
    }

    impl<T> MemoryRepository<T> {
        pub fn new() -> Self {
            Self {
                entities: RwLock::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl<T> Repository<T> for MemoryRepository<T>
    where
        T: Entity + Clone + Send + Sync + 'static,
    {
        async fn get_by_id(&self, id: Uuid) -> Result<T, RepoError> {
            self.entities.read().get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_all(&self) -> Result<Vec<T>, RepoError> {
            Ok(self.entities.read().values().cloned().collect())
        }

        async fn create(&self, entity: T) -> Result<T, RepoError> {
            let mut entities = self.entities.write();
            if entities.contains_key(&entity.id()) {
                return Err(RepoError::Conflict(entity.id().to_string()));
            }
            entities.insert(entity.id(), entity.clone());
            Ok(entity)
        }

        async fn update(&self, entity: T) -> Result<T, RepoError> {
            let mut entities = self.entities.write();
            if !entities.contains_key(&entity.id()) {
                return Err(RepoError::NotFound);
            }
            entities.insert(entity.id(), entity.clone());
            Ok(entity)
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
            self.entities
                .write()
                .remove(&id)
                .map(|_| ())
                .ok_or(RepoError::NotFound)
        }
    }

    /// In-memory plugin record store, keyed by slug.
    #[derive(Default)]
    pub struct MemoryPluginRepository {
        records: RwLock<HashMap<String, PluginRecord>>,
    }

    impl MemoryPluginRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PluginRepository for MemoryPluginRepository {
        async fn get(&self, slug: &str) -> Result<PluginRecord, RepoError> {
            self.records.read().get(slug).cloned().ok_or(RepoError::NotFound)
        }

        async fn list(&self) -> Result<Vec<PluginRecord>, RepoError> {
            let mut records: Vec<PluginRecord> = self.records.read().values().cloned().collect();
            records.sort_by(|a, b| a.slug.cmp(&b.slug));
            Ok(records)
        }

        async fn insert(&self, record: PluginRecord) -> Result<(), RepoError> {
            let mut records = self.records.write();
            if records.contains_key(&record.slug) {
                return Err(RepoError::Conflict(record.slug.clone()));
            }
            records.insert(record.slug.clone(), record);
            Ok(())
        }

        async fn update(&self, record: PluginRecord) -> Result<(), RepoError> {
            let mut records = self.records.write();
            if !records.contains_key(&record.slug) {
                return Err(RepoError::NotFound);
            }
            records.insert(record.slug.clone(), record);
            Ok(())
        }

        async fn remove(&self, slug: &str) -> Result<(), RepoError> {
            self.records
                .write()
                .remove(slug)
                .map(|_| ())
                .ok_or(RepoError::NotFound)
        }
    }

    /// Build a shared in-memory repository for an entity type.
    pub fn shared<T>() -> Arc<MemoryRepository<T>> {
        Arc::new(MemoryRepository::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::memory::MemoryRepository;
    use super::*;

    fn post(title: &str) -> Post {
        Post {
            id: Uuid::now_v7(),
            title: title.to_string(),
            body: String::new(),
            published: 0,
        }
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let repo = MemoryRepository::<Post>::new();
        let created = repo.create(post("Hello")).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.title, "Hello");

        let mut updated = fetched.clone();
        updated.title = "Hello again".to_string();
        repo.update(updated).await.unwrap();
        assert_eq!(repo.get_by_id(created.id).await.unwrap().title, "Hello again");

        repo.delete(created.id).await.unwrap();
        assert!(matches!(
            repo.get_by_id(created.id).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn not_found_is_distinguishable() {
        let repo = MemoryRepository::<Post>::new();
        let err = repo.get_by_id(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));

        let err = repo.delete(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let repo = MemoryRepository::<Post>::new();
        let entity = post("One");
        repo.create(entity.clone()).await.unwrap();
        assert!(matches!(
            repo.create(entity).await,
            Err(RepoError::Conflict(_))
        ));
    }
}
