//! Cache Module
//!
//! Provides an expiring, priority-aware cache with fill-factor purging.

mod deferred;
mod engine;
mod item;
pub mod purge;
mod stats;


// Re-export public types
pub use deferred::{Deferred, DeferredQueue};
pub use engine::Cache;
pub use item::{current_timestamp_ms, CacheItem, EvictionCallback, ItemOptions, Priority};
pub use purge::FILL_FACTOR;
pub use stats::CacheStats;
