//! Storage Module
//!
//! Raw key/value backends the cache engine keeps its items in.
//!
//! Backends know nothing about expiration or eviction; the engine layers
//! those on top of the five primitives in [`Storage`].
//!
//! - **Memory**: `HashMap` backed, values cloned out on read
//! - **Namespaced**: JSON-encoded records under a per-cache key prefix in a
//!   shared [`LocalStore`] that can be saved to disk

mod memory;
mod namespaced;

use crate::error::Result;

pub use memory::MemoryStorage;
pub use namespaced::{LocalStore, NamespacedStorage, KEY_PREFIX};

// == Storage Trait ==
/// Contract between the engine and a storage backend.
///
/// Implementations must keep `size()` equal to the number of keys returned
/// by `keys()`. Nothing is assumed about the cost of `keys()`.
pub trait Storage<T> {
    /// Returns a copy of the record stored under `key`.
    fn get(&self, key: &str) -> Option<T>;

    /// Stores `value` under `key`, replacing any previous record.
    ///
    /// On error nothing is stored.
    fn set(&mut self, key: &str, value: T) -> Result<()>;

    /// Removes and returns the record stored under `key`.
    ///
    /// `Ok(None)` means nothing was stored. An error means a record was
    /// removed but could not be returned.
    fn remove(&mut self, key: &str) -> Result<Option<T>>;

    /// Returns the number of live records.
    fn size(&self) -> usize;

    /// Returns every live key, in no particular order.
    fn keys(&self) -> Vec<String>;
}
