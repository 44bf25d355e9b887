//! Rollup memoization
//!
//! Caches rollup maps keyed by `(store version, dimension, scope, window)`. Only the rollup
//! is memoized; sorting, truncation and percentages are always recomputed, so a metric or
//! limit change never touches the cache. A cache belongs to one engine configuration:
//! entity and secondary dimensions are not part of the key.

use crate::models::{Dimension, GroupAggregate, Scope, TimeWindow};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type RollupMap = BTreeMap<String, GroupAggregate>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RollupKey {
    pub store_version: u64,
    pub dimension: Dimension,
    pub scope: Scope,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct RollupCache {
    entries: DashMap<RollupKey, Arc<RollupMap>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RollupCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get_or_compute<F>(&self, key: RollupKey, compute: F) -> Arc<RollupMap>
    where
        F: FnOnce() -> RollupMap,
    {
        if let Some(hit) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(dimension = %key.dimension, scope = %key.scope, "Rollup cache hit");
            return Arc::clone(hit.value());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(compute());

        if self.entries.len() >= self.max_entries {
            self.evict(key.store_version);
        }
        self.entries.insert(key, Arc::clone(&computed));

        computed
    }

    /// Drops entries of other store versions first; clears everything if that is not
    /// enough to make room.
    fn evict(&self, current_version: u64) {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key.store_version == current_version);

        if self.entries.len() >= self.max_entries {
            self.entries.clear();
        }

        tracing::debug!(
            before = before,
            after = self.entries.len(),
            max_entries = self.max_entries,
            "Evicted rollup cache entries"
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(version: u64, dimension: &str) -> RollupKey {
        RollupKey {
            store_version: version,
            dimension: Dimension::new(dimension),
            scope: Scope::All,
            window: TimeWindow::unbounded(),
        }
    }

    fn map_with(group: &str) -> RollupMap {
        let mut map = RollupMap::new();
        map.insert(group.to_string(), GroupAggregate::new(group));
        map
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let cache = RollupCache::new(8);
        let first = cache.get_or_compute(key(1, "province"), || map_with("A"));
        let second = cache.get_or_compute(key(1, "province"), || map_with("B"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.contains_key("A"));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_scope_is_part_of_the_key() {
        let cache = RollupCache::new(8);
        cache.get_or_compute(key(1, "city"), || map_with("all"));
        let scoped = RollupKey {
            scope: Scope::only("province", "A"),
            ..key(1, "city")
        };
        let result = cache.get_or_compute(scoped, || map_with("scoped"));
        assert!(result.contains_key("scoped"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction_prefers_stale_versions() {
        let cache = RollupCache::new(2);
        cache.get_or_compute(key(1, "province"), || map_with("old"));
        cache.get_or_compute(key(2, "province"), || map_with("new"));
        cache.get_or_compute(key(2, "city"), || map_with("new-city"));

        assert_eq!(cache.len(), 2);
        let kept = cache.get_or_compute(key(2, "province"), || map_with("recomputed"));
        assert!(kept.contains_key("new"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
