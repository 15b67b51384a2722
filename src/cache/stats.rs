//! Cache Statistics Module
//!
//! Counters the engine keeps about reads and about why items left the
//! cache.

use serde::Serialize;

// == Cache Stats ==
/// Read and removal counters for one cache.
///
/// An expired item found by `get_item` counts once as a miss and once as an
/// expiration. Items removed explicitly (`remove_item`, `remove_where`,
/// `clear`, replacement on set) are not counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads of an absent or expired key
    pub misses: u64,
    /// Items dropped by purges to get back under the threshold
    pub evictions: u64,
    /// Items removed because their absolute or sliding expiration passed
    pub expirations: u64,
    /// Purges that ran, whether scheduled, forced or triggered by a resize
    pub purges: u64,
    /// Live items when the snapshot was taken
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    /// Records one completed purge and the items it evicted for size.
    pub fn record_purge(&mut self, evicted: usize) {
        self.purges += 1;
        self.evictions += evicted as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        assert_eq!(
            CacheStats::new(),
            CacheStats {
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                purges: 0,
                total_entries: 0,
            }
        );
    }

    #[test]
    fn test_record_purge_accumulates_evictions() {
        let mut stats = CacheStats::new();
        stats.record_purge(3);
        stats.record_purge(0);
        stats.record_expiration();

        assert_eq!(stats.purges, 2);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_purge(2);
        stats.set_total_entries(3);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["evictions"], 2);
        assert_eq!(json["purges"], 1);
        assert_eq!(json["total_entries"], 3);
    }
}
