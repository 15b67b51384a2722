//! Prio Cache - An in-process expiring, priority-aware cache
//!
//! Items expire by absolute instant or sliding inactivity window, carry an
//! eviction priority, and may register a callback fired after removal.
//! Bounded caches purge to a fill-factor target once they overflow.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;

pub use cache::{Cache, CacheItem, CacheStats, ItemOptions, Priority};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use storage::{LocalStore, MemoryStorage, NamespacedStorage, Storage};
pub use tasks::{spawn_maintenance_task, SharedCache};
