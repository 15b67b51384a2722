//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::Priority;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of items before a purge is scheduled, None = unbounded
    pub max_size: Option<usize>,
    /// Priority given to items set without one
    pub default_priority: Priority,
    /// Sliding expiration given to items set without one
    pub default_sliding: Option<Duration>,
    /// Interval between maintenance task runs in milliseconds
    pub maintenance_interval_ms: u64,
    /// Namespace for persisted storage keys
    pub namespace: String,
    /// File backing the persisted store, None = in-memory storage
    pub persist_path: Option<PathBuf>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum items, 0 or unset for unbounded (default: unbounded)
    /// - `CACHE_DEFAULT_PRIORITY` - `low`, `normal`, `high` or an integer (default: normal)
    /// - `CACHE_DEFAULT_SLIDING_SECS` - Default sliding window in seconds (default: none)
    /// - `CACHE_MAINTENANCE_INTERVAL_MS` - Maintenance frequency (default: 100)
    /// - `CACHE_NAMESPACE` - Persisted key namespace (default: "default")
    /// - `CACHE_PERSIST_PATH` - JSON file for the persisted store (default: none)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: env::var("CACHE_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&max| max > 0),
            default_priority: env::var("CACHE_DEFAULT_PRIORITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_priority),
            default_sliding: env::var("CACHE_DEFAULT_SLIDING_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            maintenance_interval_ms: env::var("CACHE_MAINTENANCE_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.maintenance_interval_ms),
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            persist_path: env::var("CACHE_PERSIST_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            default_priority: Priority::NORMAL,
            default_sliding: None,
            maintenance_interval_ms: 100,
            namespace: "default".to_string(),
            persist_path: None,
        }
    }
}
