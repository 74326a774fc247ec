//! Built-in features: blog, courses, forum, archive.
//!
//! Each feature follows the same wiring discipline: resolve required
//! repositories first (fail fast, no partial wiring), reuse an
//! already-registered service by swapping its repository in place, refresh
//! the existing handler's service reference rather than re-registering,
//! then expose the service to the rendering pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Feature, FeatureError, FeatureHandler};
use crate::host::Host;
use crate::registry::ns;
use crate::render::html_escape;
use crate::repo::{Course, ForumThread, Lesson, Post, RepoError, Repository};

/// The static registration list the controller is built from.
pub fn builtin_features() -> Vec<Arc<dyn Feature>> {
    vec![
        Arc::new(BlogFeature),
        Arc::new(CoursesFeature),
        Arc::new(ForumFeature),
        Arc::new(ArchiveFeature),
    ]
}

fn internal(feature: &str, err: RepoError) -> FeatureError {
    FeatureError::Internal {
        feature: feature.to_string(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Blog
// ---------------------------------------------------------------------------

/// Published posts, newest first.
pub struct BlogService {
    posts: RwLock<Arc<dyn Repository<Post>>>,
}

impl BlogService {
    fn new(posts: Arc<dyn Repository<Post>>) -> Self {
        Self {
            posts: RwLock::new(posts),
        }
    }

    /// Swap the repository in place. Re-activation calls this instead of
    /// replacing the service, preserving any references handlers and
    /// renderers already hold.
    fn set_repository(&self, posts: Arc<dyn Repository<Post>>) {
        *self.posts.write() = posts;
    }

    /// The most recently published posts.
    pub async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>, RepoError> {
        let repo = self.posts.read().clone();
        let mut posts = repo.get_all().await?;
        posts.retain(|p| p.published > 0);
        posts.sort_by_key(|p| std::cmp::Reverse(p.published));
        posts.truncate(limit);
        Ok(posts)
    }
}

struct BlogHandler {
    service: RwLock<Option<Arc<BlogService>>>,
}

impl BlogHandler {
    fn set_service(&self, service: Option<Arc<BlogService>>) {
        *self.service.write() = service;
    }
}

#[async_trait]
impl FeatureHandler for BlogHandler {
    async fn handle(&self) -> Result<String, FeatureError> {
        let service = self
            .service
            .read()
            .clone()
            .ok_or_else(|| FeatureError::ServiceUnavailable {
                feature: "blog".to_string(),
            })?;

        let posts = service
            .recent_posts(10)
            .await
            .map_err(|e| internal("blog", e))?;

        let mut html = String::from("<ul class=\"blog-posts\">");
        for post in posts {
            html.push_str(&format!("<li>{}</li>", html_escape(&post.title)));
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

/// The blog feature.
pub struct BlogFeature;

impl Feature for BlogFeature {
    fn name(&self) -> &'static str {
        "blog"
    }

    fn required_repositories(&self) -> &'static [&'static str] {
        &["posts"]
    }

    fn activate(&self, host: &Host) -> Result<(), FeatureError> {
        let posts = host
            .post_repository()
            .ok_or_else(|| FeatureError::MissingDependency {
                feature: "blog".to_string(),
                repository: "posts".to_string(),
            })?;

        let registry = host.registry();
        let service = match registry.get_as::<BlogService>(ns::SERVICES, "blog") {
            Some(existing) => {
                existing.set_repository(posts);
                existing
            }
            None => {
                let service = Arc::new(BlogService::new(posts));
                registry.set(ns::SERVICES, "blog", Arc::clone(&service));
                service
            }
        };

        match registry.get_as::<BlogHandler>(ns::HANDLERS, "blog") {
            Some(handler) => handler.set_service(Some(Arc::clone(&service))),
            None => {
                let handler = Arc::new(BlogHandler {
                    service: RwLock::new(Some(Arc::clone(&service))),
                });
                registry.set(ns::HANDLERS, "blog", handler);
            }
        }

        host.render_services().bind("blog", service);
        Ok(())
    }

    fn deactivate(&self, host: &Host) {
        let registry = host.registry();
        if let Some(handler) = registry.get_as::<BlogHandler>(ns::HANDLERS, "blog") {
            handler.set_service(None);
        }
        registry.remove(ns::SERVICES, "blog");
        host.render_services().unbind("blog");
    }

    fn handler(&self, host: &Host) -> Option<Arc<dyn FeatureHandler>> {
        host.registry()
            .get_as::<BlogHandler>(ns::HANDLERS, "blog")
            .map(|h| h as Arc<dyn FeatureHandler>)
    }
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

/// Course catalog with per-course lesson counts.
pub struct CoursesService {
    courses: RwLock<Arc<dyn Repository<Course>>>,
    lessons: RwLock<Arc<dyn Repository<Lesson>>>,
}

impl CoursesService {
    fn new(courses: Arc<dyn Repository<Course>>, lessons: Arc<dyn Repository<Lesson>>) -> Self {
        Self {
            courses: RwLock::new(courses),
            lessons: RwLock::new(lessons),
        }
    }

    fn set_repositories(
        &self,
        courses: Arc<dyn Repository<Course>>,
        lessons: Arc<dyn Repository<Lesson>>,
    ) {
        *self.courses.write() = courses;
        *self.lessons.write() = lessons;
    }

    /// All courses with their lesson counts, sorted by title.
    pub async fn catalog(&self) -> Result<Vec<(Course, usize)>, RepoError> {
        let courses_repo = self.courses.read().clone();
        let lessons_repo = self.lessons.read().clone();

        let mut courses = courses_repo.get_all().await?;
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        let lessons = lessons_repo.get_all().await?;

        Ok(courses
            .into_iter()
            .map(|course| {
                let count = lessons.iter().filter(|l| l.course_id == course.id).count();
                (course, count)
            })
            .collect())
    }
}

struct CoursesHandler {
    service: RwLock<Option<Arc<CoursesService>>>,
}

impl CoursesHandler {
    fn set_service(&self, service: Option<Arc<CoursesService>>) {
        *self.service.write() = service;
    }
}

#[async_trait]
impl FeatureHandler for CoursesHandler {
    async fn handle(&self) -> Result<String, FeatureError> {
        let service = self
            .service
            .read()
            .clone()
            .ok_or_else(|| FeatureError::ServiceUnavailable {
                feature: "courses".to_string(),
            })?;

        let catalog = service.catalog().await.map_err(|e| internal("courses", e))?;

        let mut html = String::from("<ul class=\"courses\">");
        for (course, lesson_count) in catalog {
            html.push_str(&format!(
                "<li>{} ({lesson_count} lessons)</li>",
                html_escape(&course.title)
            ));
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

/// The courses feature.
pub struct CoursesFeature;

impl Feature for CoursesFeature {
    fn name(&self) -> &'static str {
        "courses"
    }

    fn required_repositories(&self) -> &'static [&'static str] {
        &["courses", "lessons"]
    }

    fn activate(&self, host: &Host) -> Result<(), FeatureError> {
        // Resolve everything before wiring anything.
        let courses = host
            .course_repository()
            .ok_or_else(|| FeatureError::MissingDependency {
                feature: "courses".to_string(),
                repository: "courses".to_string(),
            })?;
        let lessons = host
            .lesson_repository()
            .ok_or_else(|| FeatureError::MissingDependency {
                feature: "courses".to_string(),
                repository: "lessons".to_string(),
            })?;

        let registry = host.registry();
        let service = match registry.get_as::<CoursesService>(ns::SERVICES, "courses") {
            Some(existing) => {
                existing.set_repositories(courses, lessons);
                existing
            }
            None => {
                let service = Arc::new(CoursesService::new(courses, lessons));
                registry.set(ns::SERVICES, "courses", Arc::clone(&service));
                service
            }
        };

        match registry.get_as::<CoursesHandler>(ns::HANDLERS, "courses") {
            Some(handler) => handler.set_service(Some(Arc::clone(&service))),
            None => {
                let handler = Arc::new(CoursesHandler {
                    service: RwLock::new(Some(Arc::clone(&service))),
                });
                registry.set(ns::HANDLERS, "courses", handler);
            }
        }

        host.render_services().bind("courses", service);
        Ok(())
    }

    fn deactivate(&self, host: &Host) {
        let registry = host.registry();
        if let Some(handler) = registry.get_as::<CoursesHandler>(ns::HANDLERS, "courses") {
            handler.set_service(None);
        }
        registry.remove(ns::SERVICES, "courses");
        host.render_services().unbind("courses");
    }

    fn handler(&self, host: &Host) -> Option<Arc<dyn FeatureHandler>> {
        host.registry()
            .get_as::<CoursesHandler>(ns::HANDLERS, "courses")
            .map(|h| h as Arc<dyn FeatureHandler>)
    }
}

// ---------------------------------------------------------------------------
// Forum
// ---------------------------------------------------------------------------

/// Forum thread listing, most recently updated first.
pub struct ForumService {
    threads: RwLock<Arc<dyn Repository<ForumThread>>>,
}

impl ForumService {
    fn new(threads: Arc<dyn Repository<ForumThread>>) -> Self {
        Self {
            threads: RwLock::new(threads),
        }
    }

    fn set_repository(&self, threads: Arc<dyn Repository<ForumThread>>) {
        *self.threads.write() = threads;
    }

    /// The most recently updated threads.
    pub async fn latest_threads(&self, limit: usize) -> Result<Vec<ForumThread>, RepoError> {
        let repo = self.threads.read().clone();
        let mut threads = repo.get_all().await?;
        threads.sort_by_key(|t| std::cmp::Reverse(t.updated));
        threads.truncate(limit);
        Ok(threads)
    }
}

struct ForumHandler {
    service: RwLock<Option<Arc<ForumService>>>,
}

impl ForumHandler {
    fn set_service(&self, service: Option<Arc<ForumService>>) {
        *self.service.write() = service;
    }
}

#[async_trait]
impl FeatureHandler for ForumHandler {
    async fn handle(&self) -> Result<String, FeatureError> {
        let service = self
            .service
            .read()
            .clone()
            .ok_or_else(|| FeatureError::ServiceUnavailable {
                feature: "forum".to_string(),
            })?;

        let threads = service
            .latest_threads(20)
            .await
            .map_err(|e| internal("forum", e))?;

        let mut html = String::from("<ul class=\"forum-threads\">");
        for thread in threads {
            html.push_str(&format!(
                "<li>{} ({} replies)</li>",
                html_escape(&thread.title),
                thread.replies
            ));
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

/// The forum feature.
pub struct ForumFeature;

impl Feature for ForumFeature {
    fn name(&self) -> &'static str {
        "forum"
    }

    fn required_repositories(&self) -> &'static [&'static str] {
        &["threads"]
    }

    fn activate(&self, host: &Host) -> Result<(), FeatureError> {
        let threads = host
            .thread_repository()
            .ok_or_else(|| FeatureError::MissingDependency {
                feature: "forum".to_string(),
                repository: "threads".to_string(),
            })?;

        let registry = host.registry();
        let service = match registry.get_as::<ForumService>(ns::SERVICES, "forum") {
            Some(existing) => {
                existing.set_repository(threads);
                existing
            }
            None => {
                let service = Arc::new(ForumService::new(threads));
                registry.set(ns::SERVICES, "forum", Arc::clone(&service));
                service
            }
        };

        match registry.get_as::<ForumHandler>(ns::HANDLERS, "forum") {
            Some(handler) => handler.set_service(Some(Arc::clone(&service))),
            None => {
                let handler = Arc::new(ForumHandler {
                    service: RwLock::new(Some(Arc::clone(&service))),
                });
                registry.set(ns::HANDLERS, "forum", handler);
            }
        }

        host.render_services().bind("forum", service);
        Ok(())
    }

    fn deactivate(&self, host: &Host) {
        let registry = host.registry();
        if let Some(handler) = registry.get_as::<ForumHandler>(ns::HANDLERS, "forum") {
            handler.set_service(None);
        }
        registry.remove(ns::SERVICES, "forum");
        host.render_services().unbind("forum");
    }

    fn handler(&self, host: &Host) -> Option<Arc<dyn FeatureHandler>> {
        host.registry()
            .get_as::<ForumHandler>(ns::HANDLERS, "forum")
            .map(|h| h as Arc<dyn FeatureHandler>)
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Post counts grouped by publication month.
pub struct ArchiveService {
    posts: RwLock<Arc<dyn Repository<Post>>>,
}

impl ArchiveService {
    fn new(posts: Arc<dyn Repository<Post>>) -> Self {
        Self {
            posts: RwLock::new(posts),
        }
    }

    fn set_repository(&self, posts: Arc<dyn Repository<Post>>) {
        *self.posts.write() = posts;
    }

    /// Published post counts keyed by `YYYY-MM`, newest month last.
    pub async fn months(&self) -> Result<BTreeMap<String, usize>, RepoError> {
        let repo = self.posts.read().clone();
        let posts = repo.get_all().await?;

        let mut months = BTreeMap::new();
        for post in posts.iter().filter(|p| p.published > 0) {
            let Some(date) = chrono::DateTime::from_timestamp(post.published, 0) else {
                continue;
            };
            let month = date.format("%Y-%m").to_string();
            *months.entry(month).or_insert(0) += 1;
        }
        Ok(months)
    }
}

struct ArchiveHandler {
    service: RwLock<Option<Arc<ArchiveService>>>,
}

impl ArchiveHandler {
    fn set_service(&self, service: Option<Arc<ArchiveService>>) {
        *self.service.write() = service;
    }
}

#[async_trait]
impl FeatureHandler for ArchiveHandler {
    async fn handle(&self) -> Result<String, FeatureError> {
        let service = self
            .service
            .read()
            .clone()
            .ok_or_else(|| FeatureError::ServiceUnavailable {
                feature: "archive".to_string(),
            })?;

        let months = service.months().await.map_err(|e| internal("archive", e))?;

        let mut html = String::from("<ul class=\"archive\">");
        for (month, count) in months.iter().rev() {
            html.push_str(&format!("<li>{month} ({count})</li>"));
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

/// The archive feature.
pub struct ArchiveFeature;

impl Feature for ArchiveFeature {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn required_repositories(&self) -> &'static [&'static str] {
        &["posts"]
    }

    fn activate(&self, host: &Host) -> Result<(), FeatureError> {
        let posts = host
            .post_repository()
            .ok_or_else(|| FeatureError::MissingDependency {
                feature: "archive".to_string(),
                repository: "posts".to_string(),
            })?;

        let registry = host.registry();
        let service = match registry.get_as::<ArchiveService>(ns::SERVICES, "archive") {
            Some(existing) => {
                existing.set_repository(posts);
                existing
            }
            None => {
                let service = Arc::new(ArchiveService::new(posts));
                registry.set(ns::SERVICES, "archive", Arc::clone(&service));
                service
            }
        };

        match registry.get_as::<ArchiveHandler>(ns::HANDLERS, "archive") {
            Some(handler) => handler.set_service(Some(Arc::clone(&service))),
            None => {
                let handler = Arc::new(ArchiveHandler {
                    service: RwLock::new(Some(Arc::clone(&service))),
                });
                registry.set(ns::HANDLERS, "archive", handler);
            }
        }

        host.render_services().bind("archive", service);
        Ok(())
    }

    fn deactivate(&self, host: &Host) {
        let registry = host.registry();
        if let Some(handler) = registry.get_as::<ArchiveHandler>(ns::HANDLERS, "archive") {
            handler.set_service(None);
        }
        registry.remove(ns::SERVICES, "archive");
        host.render_services().unbind("archive");
    }

    fn handler(&self, host: &Host) -> Option<Arc<dyn FeatureHandler>> {
        host.registry()
            .get_as::<ArchiveHandler>(ns::HANDLERS, "archive")
            .map(|h| h as Arc<dyn FeatureHandler>)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::repo::memory::MemoryRepository;

    fn post(title: &str, published: i64) -> Post {
        Post {
            id: Uuid::now_v7(),
            title: title.to_string(),
            body: String::new(),
            published,
        }
    }

    #[tokio::test]
    async fn blog_service_lists_published_posts_newest_first() {
        let repo: Arc<dyn Repository<Post>> = Arc::new(MemoryRepository::new());
        repo.create(post("Older", 100)).await.unwrap();
        repo.create(post("Newer", 200)).await.unwrap();
        repo.create(post("Draft", 0)).await.unwrap();

        let service = BlogService::new(repo);
        let posts = service.recent_posts(10).await.unwrap();

        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn courses_service_counts_lessons() {
        let courses: Arc<dyn Repository<Course>> = Arc::new(MemoryRepository::new());
        let lessons: Arc<dyn Repository<Lesson>> = Arc::new(MemoryRepository::new());

        let course = courses
            .create(Course {
                id: Uuid::now_v7(),
                title: "Rust 101".to_string(),
                summary: String::new(),
            })
            .await
            .unwrap();
        for i in 0..3 {
            lessons
                .create(Lesson {
                    id: Uuid::now_v7(),
                    course_id: course.id,
                    title: format!("Lesson {i}"),
                    order: i,
                })
                .await
                .unwrap();
        }

        let service = CoursesService::new(courses, lessons);
        let catalog = service.catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].1, 3);
    }

    #[tokio::test]
    async fn archive_service_groups_posts_by_month() {
        let repo: Arc<dyn Repository<Post>> = Arc::new(MemoryRepository::new());
        // 2025-01-15 and 2025-02-01 UTC.
        repo.create(post("Jan a", 1_736_899_200)).await.unwrap();
        repo.create(post("Jan b", 1_736_985_600)).await.unwrap();
        repo.create(post("Feb", 1_738_368_000)).await.unwrap();

        let service = ArchiveService::new(repo);
        let months = service.months().await.unwrap();

        assert_eq!(months.get("2025-01"), Some(&2));
        assert_eq!(months.get("2025-02"), Some(&1));
    }
}
