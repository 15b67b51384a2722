//! Cache Item Module
//!
//! Defines the engine's record for a cached value: expiration rules,
//! eviction priority, last access time and an optional eviction callback.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Priority ==
/// Eviction-order hint. Higher values survive purges longer.
///
/// Any integer is accepted; the named levels are the usual choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    pub const LOW: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(2);
    pub const HIGH: Priority = Priority(4);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Priority::LOW => write!(f, "low"),
            Priority::NORMAL => write!(f, "normal"),
            Priority::HIGH => write!(f, "high"),
            Priority(other) => write!(f, "{}", other),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    /// Parses `low`, `normal`, `high` (case-insensitive) or a bare integer.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::LOW),
            "normal" => Ok(Priority::NORMAL),
            "high" => Ok(Priority::HIGH),
            other => other
                .parse::<u32>()
                .map(Priority)
                .map_err(|_| format!("invalid priority: {}", s)),
        }
    }
}

// == Eviction Callback ==
/// Invoked with the key and value of an item after it leaves the cache.
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

// == Item Options ==
/// Per-item options for `Cache::set_item`.
///
/// Unset fields fall back to the cache's configured defaults.
pub struct ItemOptions<V> {
    /// Instant after which the item is invalid
    pub expiration_absolute: Option<DateTime<Utc>>,
    /// Permitted inactivity before the item is invalid
    pub expiration_sliding: Option<Duration>,
    /// Eviction priority
    pub priority: Option<Priority>,
    /// Called with (key, value) when the item is removed for any reason
    pub callback: Option<EvictionCallback<V>>,
}

impl<V> ItemOptions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absolute(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_absolute = Some(at);
        self
    }

    pub fn sliding(mut self, window: Duration) -> Self {
        self.expiration_sliding = Some(window);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &V) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl<V> Default for ItemOptions<V> {
    fn default() -> Self {
        Self {
            expiration_absolute: None,
            expiration_sliding: None,
            priority: None,
            callback: None,
        }
    }
}

impl<V> fmt::Debug for ItemOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemOptions")
            .field("expiration_absolute", &self.expiration_absolute)
            .field("expiration_sliding", &self.expiration_sliding)
            .field("priority", &self.priority)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// == Cache Item ==
/// A cached value with its metadata.
///
/// The callback is never persisted: a record loaded back from a persisted
/// store has no callback.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "V: Serialize", deserialize = "V: Deserialize<'de>"))]
pub struct CacheItem<V> {
    /// Unique, non-empty key
    pub key: String,
    /// The stored value
    pub value: V,
    /// Absolute expiration instant, None = never
    pub expiration_absolute: Option<DateTime<Utc>>,
    /// Sliding expiration window, None = never
    pub expiration_sliding: Option<Duration>,
    /// Eviction priority
    pub priority: Priority,
    /// Last successful read (or creation), Unix milliseconds
    pub last_accessed: u64,
    #[serde(skip)]
    pub callback: Option<EvictionCallback<V>>,
}

impl<V> CacheItem<V> {
    // == Constructor ==
    /// Creates a new item stamped with the current time.
    ///
    /// Fails with `InvalidKey` if `key` is empty. Missing options default to
    /// normal priority, no expiration and no callback.
    pub fn new(key: impl Into<String>, value: V, options: ItemOptions<V>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        Ok(Self {
            key,
            value,
            expiration_absolute: options.expiration_absolute,
            expiration_sliding: options.expiration_sliding,
            priority: options.priority.unwrap_or_default(),
            last_accessed: current_timestamp_ms(),
            callback: options.callback,
        })
    }

    // == Is Expired ==
    /// Checks the item against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks the item against `now` (Unix milliseconds).
    ///
    /// Absolute expiration is checked first, then sliding; either one having
    /// strictly passed expires the item.
    pub fn is_expired_at(&self, now: u64) -> bool {
        if let Some(at) = self.expiration_absolute {
            if at.timestamp_millis() < now as i64 {
                return true;
            }
        }

        match self.expiration_sliding {
            Some(window) => {
                let window = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
                let deadline = self.last_accessed.saturating_add(window);
                deadline < now
            }
            None => false,
        }
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self) {
        self.last_accessed = current_timestamp_ms();
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheItem<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheItem")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("expiration_absolute", &self.expiration_absolute)
            .field("expiration_sliding", &self.expiration_sliding)
            .field("priority", &self.priority)
            .field("last_accessed", &self.last_accessed)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
