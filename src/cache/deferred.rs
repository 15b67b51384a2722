//! Deferred Work Module
//!
//! Queue of work the engine schedules instead of running inline: size-bounded
//! purges after an overflowing set, and eviction callbacks after removals.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::cache::EvictionCallback;

// == Deferred ==
/// A unit of scheduled work.
pub enum Deferred<V> {
    /// Run a size-bounded purge against the cache
    Purge,
    /// Invoke an eviction callback for a removed item
    Evicted {
        callback: EvictionCallback<V>,
        key: String,
        value: V,
    },
}

impl<V> Deferred<V> {
    /// Invokes the callback of an `Evicted` entry. `Purge` needs the cache and
    /// is a no-op here.
    ///
    /// A panicking callback is contained and logged so the rest of a batch
    /// still runs. Returns false if the callback panicked.
    pub fn invoke(self) -> bool {
        let Deferred::Evicted {
            callback,
            key,
            value,
        } = self
        else {
            return true;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| callback(&key, &value))) {
            Ok(()) => true,
            Err(_) => {
                warn!(key = %key, "Eviction callback panicked");
                false
            }
        }
    }

    pub fn is_purge(&self) -> bool {
        matches!(self, Deferred::Purge)
    }
}

impl<V> fmt::Debug for Deferred<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Purge => write!(f, "Purge"),
            Deferred::Evicted { key, .. } => f.debug_struct("Evicted").field("key", key).finish(),
        }
    }
}

// == Deferred Queue ==
/// FIFO of scheduled work. At most one purge is queued at a time so a burst
/// of overflowing sets schedules a single purge.
pub struct DeferredQueue<V> {
    tasks: VecDeque<Deferred<V>>,
    purge_scheduled: bool,
}

impl<V> DeferredQueue<V> {
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
            purge_scheduled: false,
        }
    }

    // == Schedule Purge ==
    /// Queues a purge unless one is already waiting.
    ///
    /// Returns true if a new purge was queued.
    pub fn schedule_purge(&mut self) -> bool {
        if self.purge_scheduled {
            return false;
        }
        self.purge_scheduled = true;
        self.tasks.push_back(Deferred::Purge);
        true
    }

    // == Schedule Callback ==
    pub fn schedule_callback(&mut self, callback: EvictionCallback<V>, key: String, value: V) {
        self.tasks.push_back(Deferred::Evicted {
            callback,
            key,
            value,
        });
    }

    // == Pop ==
    /// Removes the next task. Popping a purge allows another to be scheduled.
    pub fn pop(&mut self) -> Option<Deferred<V>> {
        let task = self.tasks.pop_front()?;
        if task.is_purge() {
            self.purge_scheduled = false;
        }
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<V> Default for DeferredQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_queue_new() {
        let queue: DeferredQueue<u32> = DeferredQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_purge_scheduled_once() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new();

        assert!(queue.schedule_purge());
        assert!(!queue.schedule_purge());
        assert_eq!(queue.len(), 1);

        assert!(queue.pop().unwrap().is_purge());
        assert!(queue.is_empty());
        assert!(queue.schedule_purge());
    }

    #[test]
    fn test_fifo_order() {
        let mut queue: DeferredQueue<u32> = DeferredQueue::new();
        let callback: EvictionCallback<u32> = Arc::new(|_, _| {});

        queue.schedule_callback(callback.clone(), "a".to_string(), 1);
        queue.schedule_purge();
        queue.schedule_callback(callback, "b".to_string(), 2);

        let tasks: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(tasks.len(), 3);
        assert!(matches!(&tasks[0], Deferred::Evicted { key, .. } if key == "a"));
        assert!(tasks[1].is_purge());
        assert!(matches!(&tasks[2], Deferred::Evicted { key, .. } if key == "b"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_invoke_calls_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let callback: EvictionCallback<u32> = Arc::new(move |key, value| {
            assert_eq!(key, "foo");
            assert_eq!(*value, 7);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let mut queue = DeferredQueue::new();
        queue.schedule_callback(callback, "foo".to_string(), 7);
        assert!(queue.pop().unwrap().invoke());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_contains_panicking_callback() {
        let callback: EvictionCallback<u32> = Arc::new(|_, _| panic!("callback failed"));
        let mut queue = DeferredQueue::new();
        queue.schedule_callback(callback, "boom".to_string(), 1);

        assert!(!queue.pop().unwrap().invoke());
        assert!(Deferred::<u32>::Purge.invoke());
    }
}
