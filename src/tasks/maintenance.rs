//! Cache Maintenance Task
//!
//! Background task that drains a shared cache's deferred work: scheduled
//! purges, eviction callbacks and expired items.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheItem};
use crate::storage::Storage;

/// A cache shared between tasks.
pub type SharedCache<V, S> = Arc<RwLock<Cache<V, S>>>;

/// Spawns a background task that periodically runs a shared cache's
/// deferred work.
///
/// Each run takes the write lock to sweep expired items and run any
/// scheduled purge, then releases it before invoking eviction callbacks, so
/// a callback may safely reach back into the cache. A panicking callback is
/// logged and skipped; the task keeps running.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval_ms` - Interval in milliseconds between runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown. Work already queued when the task is aborted stays queued.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(Cache::<String>::with_max_size(1000)));
/// let handle = spawn_maintenance_task(cache.clone(), 100);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task<V, S>(cache: SharedCache<V, S>, interval_ms: u64) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
    S: Storage<CacheItem<V>> + Send + Sync + 'static,
{
    let interval = Duration::from_millis(interval_ms.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} ms",
            interval_ms
        );

        loop {
            tokio::time::sleep(interval).await;

            let (expired, callbacks) = {
                let mut guard = cache.write().await;
                let expired = guard.remove_expired();
                (expired, guard.take_pending())
            };

            let invoked = callbacks.len();
            let mut failed = 0;
            for task in callbacks {
                if !task.invoke() {
                    failed += 1;
                }
            }

            if failed > 0 {
                warn!(failed, invoked, "Eviction callbacks panicked during maintenance");
            }
            if expired > 0 || invoked > 0 {
                debug!(expired, invoked, "Cache maintenance run");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use crate::cache::ItemOptions;
    use crate::storage::MemoryStorage;

    fn shared(max_size: usize) -> SharedCache<String, MemoryStorage<CacheItem<String>>> {
        Arc::new(RwLock::new(Cache::with_max_size(max_size)))
    }

    #[tokio::test]
    async fn test_maintenance_runs_scheduled_purge() {
        let cache = shared(4);
        {
            let mut guard = cache.write().await;
            for i in 0..6 {
                guard
                    .set_item(format!("k{}", i), "v".to_string(), None)
                    .unwrap();
            }
            assert_eq!(guard.size(), 6);
        }

        let handle = spawn_maintenance_task(cache.clone(), 10);
        tokio::time::sleep(Duration::from_millis(100)).await;

        {
            let guard = cache.read().await;
            assert_eq!(guard.size(), 3);
            assert!(!guard.has_pending());
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_removes_expired_entries() {
        let cache = shared(100);
        {
            let mut guard = cache.write().await;
            guard
                .set_item(
                    "expire_soon",
                    "value".to_string(),
                    Some(ItemOptions::new().absolute(Utc::now() + chrono::Duration::milliseconds(20))),
                )
                .unwrap();
            guard
                .set_item("long_lived", "value".to_string(), None)
                .unwrap();
        }

        let handle = spawn_maintenance_task(cache.clone(), 10);
        tokio::time::sleep(Duration::from_millis(150)).await;

        {
            let mut guard = cache.write().await;
            assert_eq!(guard.size(), 1);
            assert!(guard.get_item("long_lived").is_ok());
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_invokes_callbacks_outside_lock() {
        let cache = shared(100);
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let reentrant = cache.clone();
            let counter = calls.clone();
            let mut guard = cache.write().await;
            guard
                .set_item(
                    "foo",
                    "bar".to_string(),
                    Some(ItemOptions::new().on_evict(move |_, _| {
                        // Would fail if the task still held the lock
                        assert!(reentrant.try_write().is_ok());
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                )
                .unwrap();
            guard.remove_item("foo").unwrap();
        }

        let handle = spawn_maintenance_task(cache.clone(), 10);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_survives_panicking_callback() {
        let cache = shared(2);
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let counter = calls.clone();
            let mut guard = cache.write().await;
            guard
                .set_item(
                    "boom",
                    "x".to_string(),
                    Some(ItemOptions::new().on_evict(|_, _| panic!("callback failed"))),
                )
                .unwrap();
            guard
                .set_item(
                    "after",
                    "y".to_string(),
                    Some(ItemOptions::new().on_evict(move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                )
                .unwrap();
            guard.remove_item("boom").unwrap();
            guard.remove_item("after").unwrap();
            assert_eq!(guard.size(), 0);
        }

        let handle = spawn_maintenance_task(cache.clone(), 10);
        tokio::time::sleep(Duration::from_millis(60)).await;

        // The rest of the batch ran
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        {
            let mut guard = cache.write().await;
            for i in 0..5 {
                guard
                    .set_item(format!("k{}", i), "v".to_string(), None)
                    .unwrap();
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.is_finished());
        {
            let guard = cache.read().await;
            assert_eq!(guard.size(), 2);
            assert!(!guard.has_pending());
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_task_can_be_aborted() {
        let handle = spawn_maintenance_task(shared(10), 10);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
