//! Cache Engine Module
//!
//! Main cache engine combining a storage backend with expiration, the
//! fill-factor purge and hit/miss statistics.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::cache::purge::{purge_threshold, select_victims};
use crate::cache::{
    current_timestamp_ms, CacheItem, CacheStats, Deferred, DeferredQueue, EvictionCallback,
    ItemOptions, Priority,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::{MemoryStorage, Storage};

// == Cache ==
/// Expiring, priority-aware cache over a pluggable storage backend.
///
/// Size-bounded purges triggered by `set_item` and eviction callbacks are
/// deferred: they are queued and only run from `run_pending` or
/// `take_pending` (or the maintenance task), never inside the call that
/// caused them.
pub struct Cache<V, S = MemoryStorage<CacheItem<V>>> {
    /// Item records
    storage: S,
    /// Eviction callbacks by key, kept beside the storage so they survive
    /// backends that serialize records
    callbacks: HashMap<String, EvictionCallback<V>>,
    /// Number of live items
    count: usize,
    /// Maximum number of items, None = unbounded
    max_size: Option<usize>,
    /// Target size after a purge
    purge_threshold: Option<usize>,
    /// Priority for items set without one
    default_priority: Priority,
    /// Sliding window for items set without one
    default_sliding: Option<std::time::Duration>,
    /// Performance statistics
    stats: CacheStats,
    /// Scheduled purges and callbacks
    pending: DeferredQueue<V>,
}

impl<V: Clone> Cache<V> {
    // == Constructors ==
    /// Creates an in-memory cache from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_storage(config, MemoryStorage::new())
    }

    /// Creates an in-memory cache with no size bound.
    pub fn unbounded() -> Self {
        Self::new(&CacheConfig::default())
    }

    /// Creates an in-memory cache holding at most `max_size` items before a
    /// purge is scheduled.
    pub fn with_max_size(max_size: usize) -> Self {
        Self::new(&CacheConfig {
            max_size: Some(max_size),
            ..CacheConfig::default()
        })
    }
}

impl<V: Clone, S: Storage<CacheItem<V>>> Cache<V, S> {
    /// Creates a cache over `storage`.
    ///
    /// Records already present in the storage (e.g. a reopened persisted
    /// store) count as live items.
    pub fn with_storage(config: &CacheConfig, storage: S) -> Self {
        let max_size = normalize_max_size(config.max_size);
        let count = storage.size();

        info!(
            max_size = ?max_size,
            existing = count,
            "Initialized cache"
        );

        Self {
            storage,
            callbacks: HashMap::new(),
            count,
            max_size,
            purge_threshold: purge_threshold(max_size),
            default_priority: config.default_priority,
            default_sliding: config.default_sliding,
            stats: CacheStats::new(),
            pending: DeferredQueue::new(),
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A successful read refreshes the item's last access time. Expired
    /// items are removed and reported as `NotFound`. Every call records
    /// exactly one hit or miss.
    pub fn get_item(&mut self, key: &str) -> Result<V> {
        let Some(mut item) = self.storage.get(key) else {
            self.stats.record_miss();
            debug!(key, "Cache MISS");
            return Err(CacheError::NotFound(key.to_string()));
        };

        if item.is_expired() {
            self.remove_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            debug!(key, "Cache MISS (expired)");
            return Err(CacheError::NotFound(key.to_string()));
        }

        item.touch();
        let value = item.value.clone();
        if let Err(e) = self.storage.set(key, item) {
            warn!(key, error = %e, "Failed to record access time");
        }

        self.stats.record_hit();
        debug!(key, "Cache HIT");
        Ok(value)
    }

    // == Set ==
    /// Stores a value, replacing any existing item with the same key.
    ///
    /// Replacement removes the old item first, so its eviction callback
    /// fires. If the cache is then over its bound, a purge is scheduled.
    ///
    /// # Errors
    /// `InvalidKey` if `key` is empty; the cache is left untouched.
    /// `Serialization` if the backend cannot encode the item; any previous
    /// item under the key has already been removed.
    pub fn set_item(
        &mut self,
        key: impl Into<String>,
        value: V,
        options: Option<ItemOptions<V>>,
    ) -> Result<()> {
        let options = self.apply_defaults(options.unwrap_or_default());
        let mut item = CacheItem::new(key, value, options)?;
        let key = item.key.clone();

        self.remove_entry(&key);

        let callback = item.callback.take();
        self.storage.set(&key, item)?;
        if let Some(callback) = callback {
            self.callbacks.insert(key.clone(), callback);
        }
        self.count += 1;
        debug!(key = %key, "Setting key");

        if let Some(max) = self.max_size {
            if self.count > max && self.pending.schedule_purge() {
                debug!(count = self.count, max, "Cache over capacity, purge scheduled");
            }
        }

        Ok(())
    }

    // == Remove ==
    /// Removes an item and returns its value.
    ///
    /// The item's callback, if any, is queued rather than invoked.
    pub fn remove_item(&mut self, key: &str) -> Result<V> {
        self.remove_entry(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Remove Where ==
    /// Removes every item whose (key, value) satisfies `predicate`.
    ///
    /// The predicate runs exactly once per item present at call time, before
    /// any removal happens. Returns the number of items removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str, &V) -> bool,
    {
        let mut matched = Vec::new();
        for key in self.storage.keys() {
            if let Some(item) = self.storage.get(&key) {
                if predicate(key.as_str(), &item.value) {
                    matched.push(key);
                }
            }
        }

        let mut removed = 0;
        for key in &matched {
            if self.remove_entry(key).is_some() {
                removed += 1;
            }
        }

        debug!(removed, "Removed matching items");
        removed
    }

    // == Clear ==
    /// Removes every item. All eviction callbacks are queued.
    pub fn clear(&mut self) {
        for key in self.storage.keys() {
            self.remove_entry(&key);
        }
        self.count = 0;
        self.stats.set_total_entries(0);
        info!("Cache cleared");
    }

    // == Resize ==
    /// Changes the maximum size (`None` or `Some(0)` for unbounded).
    ///
    /// Shrinking below the current count purges immediately, before this
    /// call returns. Callbacks of purged items are still deferred.
    pub fn resize(&mut self, new_max: Option<usize>) {
        let old_max = self.max_size;
        self.max_size = normalize_max_size(new_max);
        self.purge_threshold = purge_threshold(self.max_size);
        info!(from = ?old_max, to = ?self.max_size, "Resizing cache");

        if self.is_over_capacity() {
            self.purge();
        }
    }

    // == Purge ==
    /// Removes expired items, then evicts the lowest-priority,
    /// least-recently-used items until the cache is at its purge threshold.
    ///
    /// Returns the number of items removed.
    pub fn purge(&mut self) -> usize {
        let (candidates, expired) = self.sweep_expired();

        let victims = match self.purge_threshold {
            Some(threshold) => select_victims(candidates, threshold),
            None => Vec::new(),
        };

        let mut evicted = 0;
        for key in &victims {
            if self.remove_entry(key).is_some() {
                evicted += 1;
            }
        }
        self.stats.record_purge(evicted);

        info!(
            expired,
            evicted,
            remaining = self.count,
            "Purged cache"
        );
        expired + victims.len()
    }

    // == Remove Expired ==
    /// Removes every expired item without applying size pressure.
    ///
    /// Returns the number of items removed.
    pub fn remove_expired(&mut self) -> usize {
        let (_, expired) = self.sweep_expired();
        if expired > 0 {
            debug!(expired, "Removed expired items");
        }
        expired
    }

    // == Deferred Work ==
    /// Runs scheduled purges and returns the queued eviction callbacks
    /// without invoking them.
    ///
    /// Lets an owner release its hold on the cache before running callbacks
    /// that may touch the cache again.
    pub fn take_pending(&mut self) -> Vec<Deferred<V>> {
        let mut callbacks = Vec::new();
        while let Some(task) = self.pending.pop() {
            match task {
                Deferred::Purge => self.run_scheduled_purge(),
                evicted => callbacks.push(evicted),
            }
        }
        callbacks
    }

    /// Runs all scheduled work, invoking callbacks inline.
    ///
    /// A panicking callback does not stop the rest of the batch. Returns the
    /// number of callbacks invoked.
    pub fn run_pending(&mut self) -> usize {
        let callbacks = self.take_pending();
        let invoked = callbacks.len();
        let mut failed = 0;
        for task in callbacks {
            if !task.invoke() {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, invoked, "Eviction callbacks panicked");
        }
        invoked
    }

    /// Returns true if a purge or callback is waiting to run.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    // == Accessors ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.count);
        stats
    }

    /// Returns the number of live items.
    pub fn size(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn purge_threshold(&self) -> Option<usize> {
        self.purge_threshold
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // == Internals ==
    /// Fills unset options from the configured defaults.
    fn apply_defaults(&self, mut options: ItemOptions<V>) -> ItemOptions<V> {
        options.priority = options.priority.or(Some(self.default_priority));
        options.expiration_sliding = options.expiration_sliding.or(self.default_sliding);
        options
    }

    /// Removes one item, queues its callback and returns its value.
    ///
    /// Bookkeeping completes before the callback is queued. A record the
    /// backend removed but could not decode still counts as removed, but
    /// has no value to return or hand to its callback.
    fn remove_entry(&mut self, key: &str) -> Option<V> {
        let callback = self.callbacks.remove(key);
        let item = match self.storage.remove(key) {
            Ok(Some(item)) => item,
            Ok(None) => return None,
            Err(e) => {
                self.count = self.count.saturating_sub(1);
                warn!(key, error = %e, "Removed unreadable record");
                return None;
            }
        };

        self.count = self.count.saturating_sub(1);
        debug!(key, "Removed key");

        if let Some(callback) = callback {
            self.pending
                .schedule_callback(callback, key.to_string(), item.value.clone());
        }
        Some(item.value)
    }

    /// Removes expired items. Returns the survivors and the number removed.
    ///
    /// Also resynchronizes `count` with the storage and drops records the
    /// storage cannot decode.
    fn sweep_expired(&mut self) -> (Vec<CacheItem<V>>, usize) {
        let now = current_timestamp_ms();
        let keys = self.storage.keys();
        let mut survivors = Vec::with_capacity(keys.len());
        let mut expired = 0;

        for key in keys {
            match self.storage.get(&key) {
                Some(item) if item.is_expired_at(now) => {
                    self.remove_entry(&key);
                    self.stats.record_expiration();
                    expired += 1;
                }
                Some(item) => survivors.push(item),
                None => {
                    self.remove_entry(&key);
                }
            }
        }

        self.count = survivors.len();
        (survivors, expired)
    }

    fn is_over_capacity(&self) -> bool {
        matches!(self.max_size, Some(max) if self.count > max)
    }

    /// A scheduled purge only acts if the cache is still over capacity.
    fn run_scheduled_purge(&mut self) {
        if self.is_over_capacity() {
            self.purge();
        } else {
            debug!(count = self.count, "Scheduled purge skipped, cache within bound");
        }
    }
}

impl<V, S> Cache<V, S>
where
    V: Clone + fmt::Display,
    S: Storage<CacheItem<V>>,
{
    // == Dump ==
    /// Human-readable listing of the cache contents, sorted by key.
    pub fn dump(&self) -> String {
        let mut keys = self.storage.keys();
        keys.sort();

        let mut out = format!("{} item(s) in cache", self.count);
        for key in keys {
            if let Some(item) = self.storage.get(&key) {
                out.push_str(&format!("\n- {} = {}", item.key, item.value));
            }
        }
        out
    }
}

impl<V, S> fmt::Display for Cache<V, S>
where
    V: Clone + fmt::Display,
    S: Storage<CacheItem<V>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

impl<V, S> fmt::Debug for Cache<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("count", &self.count)
            .field("max_size", &self.max_size)
            .field("purge_threshold", &self.purge_threshold)
            .field("stats", &self.stats)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// A bound of zero means unbounded.
fn normalize_max_size(max_size: Option<usize>) -> Option<usize> {
    max_size.filter(|&max| max > 0)
}
