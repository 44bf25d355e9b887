//! Record Store
//!
//! Holds the flat collection of [`DetailRecord`]s for one reporting session. The store is
//! filled once (by the loader or by hand) and then shared read-only, usually behind an
//! `Arc`, with everything that ranks over it.
//!
//! Every mutation assigns the store a fresh process-unique version, which the rollup
//! cache uses to tell record sets apart.

use crate::models::{DetailRecord, Dimension};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<DetailRecord>,
    version: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RecordStore {
    pub fn new(records: Vec<DetailRecord>) -> Self {
        Self {
            records,
            version: next_version(),
        }
    }

    pub fn push(&mut self, record: DetailRecord) {
        self.records.push(record);
        self.version = next_version();
    }

    pub fn extend<I: IntoIterator<Item = DetailRecord>>(&mut self, records: I) {
        self.records.extend(records);
        self.version = next_version();
    }

    pub fn all_records(&self) -> &[DetailRecord] {
        &self.records
    }

    pub fn records_where<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a DetailRecord> + 'a
    where
        P: Fn(&DetailRecord) -> bool + 'a,
    {
        self.records.iter().filter(move |record| predicate(*record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Every dimension name carried by at least one record, sorted.
    pub fn dimensions(&self) -> Vec<Dimension> {
        self.records
            .iter()
            .flat_map(|record| record.dimension_keys().keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sorted distinct values of `dimension`; feeds scope selectors.
    pub fn distinct_values(&self, dimension: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|record| record.key(dimension))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct value count per dimension.
    pub fn dimension_catalog(&self) -> BTreeMap<Dimension, usize> {
        self.dimensions()
            .into_iter()
            .map(|dimension| {
                let count = self.distinct_values(dimension.as_str()).len();
                (dimension, count)
            })
            .collect()
    }

    /// Earliest and latest record timestamps.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let earliest = self.records.iter().map(DetailRecord::timestamp).min()?;
        let latest = self.records.iter().map(DetailRecord::timestamp).max()?;
        Some((earliest, latest))
    }
}

impl FromIterator<DetailRecord> for RecordStore {
    fn from_iter<I: IntoIterator<Item = DetailRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
