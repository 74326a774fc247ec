//! Background scheduler capability.
//!
//! Named recurring and one-shot tasks on the Tokio runtime. Scheduling a
//! name that is already registered cancels the prior task first, so a
//! re-activated feature never ends up with two copies of its job running.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

type Job = Arc<dyn Fn() + Send + Sync>;

/// Scheduler capability handed to features through the host.
#[derive(Clone, Default)]
pub struct Scheduler {
    tasks: Arc<DashMap<String, JoinHandle<()>>>,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `interval`, starting one interval from now.
    pub fn schedule(&self, name: &str, interval: Duration, job: impl Fn() + Send + Sync + 'static) {
        let job: Job = Arc::new(job);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                job();
            }
        });
        self.register(name, handle);
    }

    /// Run `job` once after `delay`.
    pub fn schedule_once(&self, name: &str, delay: Duration, job: impl Fn() + Send + Sync + 'static) {
        let name_owned = name.to_string();
        let tasks = Arc::clone(&self.tasks);
        let job: Job = Arc::new(job);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job();
            tasks.remove(&name_owned);
        });
        self.register(name, handle);
    }

    /// Cancel a named task. Unknown names are ignored.
    pub fn cancel(&self, name: &str) {
        if let Some((_, handle)) = self.tasks.remove(name) {
            handle.abort();
            debug!(task = %name, "scheduled task cancelled");
        }
    }

    /// Cancel every task. Called on shutdown.
    pub fn cancel_all(&self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
        self.tasks.clear();
    }

    /// Number of currently registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn register(&self, name: &str, handle: JoinHandle<()>) {
        if let Some(prior) = self.tasks.insert(name.to_string(), handle) {
            prior.abort();
            debug!(task = %name, "replaced previously scheduled task");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn schedule_once_fires() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        scheduler.schedule_once("once", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // One-shot tasks unregister themselves after firing.
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn cancel_prevents_execution() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        scheduler.schedule_once("cancelled", Duration::from_millis(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel("cancelled");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn rescheduling_replaces_prior_task() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&first);
        scheduler.schedule("job", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        scheduler.schedule("job", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(45)).await;
        scheduler.cancel_all();

        assert_eq!(first.load(Ordering::SeqCst), 0, "replaced task must not run");
        assert!(second.load(Ordering::SeqCst) >= 1);
    }
}
