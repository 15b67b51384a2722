//! Purge Policy Module
//!
//! Decides which items a size-bounded purge evicts.
//!
//! Survivors are ordered by:
//! - Priority, highest first
//! - Last access, most recent first
//!
//! Victims are taken from the tail of that order until the survivor count
//! reaches the purge threshold.

use crate::cache::CacheItem;

// == Fill Factor ==
/// Fraction of the maximum size a purge settles at.
pub const FILL_FACTOR: f64 = 0.75;

// == Purge Threshold ==
/// Target size after a purge, `round(max_size * FILL_FACTOR)`.
///
/// Returns None for an unbounded cache.
pub fn purge_threshold(max_size: Option<usize>) -> Option<usize> {
    max_size.map(|max| (max as f64 * FILL_FACTOR).round() as usize)
}

// == Eviction Order ==
/// Sorts candidates so the best survivors come first.
pub fn sort_by_retention<V>(candidates: &mut [CacheItem<V>]) {
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.last_accessed.cmp(&a.last_accessed))
    });
}

// == Select Victims ==
/// Returns the keys to evict so that at most `threshold` candidates remain.
///
/// Candidates must already be free of expired items. Keys come back in
/// eviction order (least valuable first).
pub fn select_victims<V>(mut candidates: Vec<CacheItem<V>>, threshold: usize) -> Vec<String> {
    if candidates.len() <= threshold {
        return Vec::new();
    }

    sort_by_retention(&mut candidates);

    let mut victims = Vec::with_capacity(candidates.len() - threshold);
    while candidates.len() > threshold {
        if let Some(item) = candidates.pop() {
            victims.push(item.key);
        }
    }
    victims
}
