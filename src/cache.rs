// Per-pass read-through cache of remote task snapshots.
//
// A cache lives exactly as long as one sync pass. Every identifier is fetched
// at most once per pass, successes and failures alike, so every reference to
// it sees the same snapshot.
use crate::client::TaskService;
use crate::error::ServiceError;
use crate::model::RemoteTask;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// How many distinct identifiers are fetched concurrently.
const FETCH_CONCURRENCY: usize = 4;

pub type Lookup = Result<Arc<RemoteTask>, ServiceError>;

type Slot = Arc<OnceCell<Lookup>>;

pub struct TaskCache<'a, S> {
    service: &'a S,
    slots: Mutex<HashMap<String, Slot>>,
    fetches: AtomicUsize,
}

impl<'a, S: TaskService> TaskCache<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self {
            service,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    fn slot(&self, id: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(id.to_string()).or_default().clone()
    }

    /// Returns the snapshot for `id`, fetching it on first use.
    /// Concurrent callers for the same id share one in-flight fetch.
    pub async fn get(&self, id: &str) -> Lookup {
        let slot = self.slot(id);
        slot.get_or_init(|| async {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            log::debug!("Fetching remote task {}", id);
            let result = self.service.fetch_task(id).await.map(Arc::new);
            if let Err(e) = &result {
                log::warn!("Fetching task {} failed: {}", id, e);
            }
            result
        })
        .await
        .clone()
    }

    /// Resolves all ids, a few at a time. Results are read back with
    /// [`TaskCache::peek`] or [`TaskCache::get`].
    pub async fn get_many<'i, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'i str>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = ids.into_iter().filter(|id| seen.insert(*id)).collect();

        stream::iter(unique)
            .map(|id| self.get(id))
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;
    }

    /// The resolved result for `id`, without fetching. `None` when the id
    /// was never requested in this pass (or its fetch is still running).
    pub fn peek(&self, id: &str) -> Option<Lookup> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(id)?.get().cloned()
    }

    /// Number of network fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    struct SlowService {
        calls: AtomicUsize,
    }

    impl TaskService for SlowService {
        async fn fetch_task(&self, id: &str) -> Result<RemoteTask, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if id.starts_with("gone") {
                return Err(ServiceError::NotFound(id.to_string()));
            }
            Ok(RemoteTask {
                id: id.to_string(),
                label: None,
                title: format!("Task {id}"),
                status: "Todo".to_string(),
                last_edited: Utc::now(),
                url: format!("https://service/task-{id}"),
                project: None,
            })
        }

        async fn update_task_status(&self, _id: &str, _status: &str) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    fn service() -> SlowService {
        SlowService {
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let svc = service();
        let cache = TaskCache::new(&svc);

        let (a, b) = tokio::join!(cache.get("abc"), cache.get("abc"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_memoized() {
        let svc = service();
        let cache = TaskCache::new(&svc);

        assert!(cache.get("gone-1").await.is_err());
        assert!(cache.get("gone-1").await.is_err());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.peek("gone-1"),
            Some(Err(ServiceError::NotFound("gone-1".to_string())))
        );
    }

    #[tokio::test]
    async fn test_get_many_dedupes_and_fills_peek() {
        let svc = service();
        let cache = TaskCache::new(&svc);

        assert!(cache.peek("a").is_none());
        cache.get_many(["a", "b", "a", "c", "b"]).await;
        assert_eq!(svc.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.peek("b").unwrap().unwrap().title, "Task b");
        assert!(cache.peek("d").is_none());
    }

    #[tokio::test]
    async fn test_caches_do_not_share_state() {
        let svc = service();
        {
            let first = TaskCache::new(&svc);
            first.get("abc").await.unwrap();
        }
        let second = TaskCache::new(&svc);
        assert!(second.peek("abc").is_none());
        second.get("abc").await.unwrap();
        assert_eq!(svc.calls.load(Ordering::SeqCst), 2);
    }
}
