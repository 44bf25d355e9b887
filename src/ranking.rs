//! Ranking & Filtering Facade
//!
//! The surface consumed by presentation: narrow the record population by scope and time
//! window, roll it up along a dimension, rank the groups by a metric and attach each
//! group's share of the scoped total.
//!
//! ## Ranking rules
//!
//! - Scoping filters records **before** rollup, so counts and percentages describe the
//!   scoped population rather than highlighting a row of the global one.
//! - `scoped_total` is the metric summed over every group of the scoped population,
//!   before truncation. Contribution percentages divide by it, never by the unfiltered
//!   grand total, and are `0` when it is not positive.
//! - Groups sort by metric descending; equal values sort by group key ascending so a
//!   refresh never reorders ties.
//! - A scope that leaves a single group yields a one-row view. Drilling into finer groups
//!   is a separate query on a finer dimension.
//!
//! [`top_n`] is the stateless entry point. [`Leaderboard`] binds a shared store and an
//! engine together and can memoize rollups through a [`RollupCache`].

use crate::cache::{RollupCache, RollupKey, RollupMap};
use crate::config::CacheConfig;
use crate::models::{DetailRecord, Dimension, Metric, RankedEntry, RankedView, Scope, TimeWindow};
use crate::rollup::RollupEngine;
use crate::store::RecordStore;
use std::sync::Arc;

pub const DEFAULT_TOP_N: usize = 10;

/// One leaderboard selection. `limit: None` keeps every group.
#[derive(Debug, Clone, PartialEq)]
pub struct RankQuery {
    pub dimension: Dimension,
    pub metric: Metric,
    pub scope: Scope,
    pub window: TimeWindow,
    pub limit: Option<usize>,
}

impl RankQuery {
    pub fn new(dimension: impl Into<Dimension>, metric: Metric) -> Self {
        Self {
            dimension: dimension.into(),
            metric,
            scope: Scope::All,
            window: TimeWindow::unbounded(),
            limit: Some(DEFAULT_TOP_N),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn unlimited(mut self) -> Self {
        self.limit = None;
        self
    }
}

/// Records of `store` inside both `scope` and `window`.
pub fn scoped_records<'a>(
    store: &'a RecordStore,
    scope: &'a Scope,
    window: &'a TimeWindow,
) -> impl Iterator<Item = &'a DetailRecord> + 'a {
    store.records_where(move |record| scope.matches(record) && window.contains(record.timestamp()))
}

/// Uncached `topN(dimension, metric, scope, n)`.
pub fn top_n(store: &RecordStore, engine: &RollupEngine, query: &RankQuery) -> RankedView {
    let groups = engine.rollup(
        scoped_records(store, &query.scope, &query.window),
        &query.dimension,
    );
    rank_groups(&groups, query)
}

/// Sort, truncate and annotate an already computed rollup.
pub fn rank_groups(groups: &RollupMap, query: &RankQuery) -> RankedView {
    let metric = &query.metric;

    // Summed in key order so the total is reproducible to the bit; saturates at f64::MAX
    let scoped_total = groups
        .values()
        .map(|group| metric.value(group))
        .fold(0.0_f64, |total, value| (total + value).min(f64::MAX));

    let mut ranked: Vec<(f64, &str)> = groups
        .values()
        .map(|group| (metric.value(group), group.group_key.as_str()))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    let keep = query.limit.unwrap_or(ranked.len());
    let entries: Vec<RankedEntry> = ranked
        .into_iter()
        .take(keep)
        .enumerate()
        .filter_map(|(index, (metric_value, group_key))| {
            groups.get(group_key).map(|group| RankedEntry {
                rank: index + 1,
                aggregate: group.clone(),
                metric_value,
                contribution_percent: contribution_percent(metric_value, scoped_total),
            })
        })
        .collect();

    tracing::debug!(
        dimension = %query.dimension,
        metric = %metric,
        scope = %query.scope,
        groups = groups.len(),
        kept = entries.len(),
        scoped_total = scoped_total,
        "Ranked groups"
    );

    RankedView {
        dimension: query.dimension.clone(),
        metric: metric.clone(),
        scope: query.scope.clone(),
        window: query.window,
        scoped_total,
        group_count: groups.len(),
        entries,
    }
}

pub fn contribution_percent(value: f64, scoped_total: f64) -> f64 {
    if scoped_total > 0.0 && value.is_finite() {
        value / scoped_total * 100.0
    } else {
        0.0
    }
}

/// Store + engine pair that presentation code queries repeatedly.
#[derive(Debug)]
pub struct Leaderboard {
    store: Arc<RecordStore>,
    engine: RollupEngine,
    cache: Option<RollupCache>,
}

impl Leaderboard {
    pub fn new(store: Arc<RecordStore>, engine: RollupEngine) -> Self {
        Self {
            store,
            engine,
            cache: None,
        }
    }

    /// Memoize rollups, keeping at most `max_entries` maps.
    pub fn with_cache(mut self, max_entries: usize) -> Self {
        self.cache = Some(RollupCache::new(max_entries));
        self
    }

    /// Attach a cache when `[cache]` enables one.
    pub fn with_cache_config(self, config: &CacheConfig) -> Self {
        if config.enabled {
            self.with_cache(config.max_entries)
        } else {
            self
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn engine(&self) -> &RollupEngine {
        &self.engine
    }

    pub fn cache(&self) -> Option<&RollupCache> {
        self.cache.as_ref()
    }

    /// Every group of the scoped population along `dimension`.
    pub fn rollup(&self, dimension: &Dimension, scope: &Scope, window: &TimeWindow) -> Arc<RollupMap> {
        let compute = || {
            self.engine
                .rollup(scoped_records(&self.store, scope, window), dimension)
        };

        match &self.cache {
            Some(cache) => cache.get_or_compute(
                RollupKey {
                    store_version: self.store.version(),
                    dimension: dimension.clone(),
                    scope: scope.clone(),
                    window: *window,
                },
                compute,
            ),
            None => Arc::new(compute()),
        }
    }

    pub fn top_n(&self, query: &RankQuery) -> RankedView {
        let groups = self.rollup(&query.dimension, &query.scope, &query.window);
        rank_groups(&groups, query)
    }
}
