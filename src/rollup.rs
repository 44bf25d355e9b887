//! Rollup Engine
//!
//! Groups detail records by one dimension and turns each group into a [`GroupAggregate`].
//!
//! ## Algorithm
//!
//! 1. **Partition**: records are bucketed by their value along the grouping dimension.
//!    Records without that key are left out of this rollup only; there is no "unknown"
//!    bucket, so missing keys never skew rates.
//! 2. **Accumulate**: per bucket, observation and exception counters, the set of distinct
//!    sub-entities (the engine's entity dimension, e.g. `commodity` for price-break views or
//!    `retailer` for sales views), the subset of entities with an exception, distinct-value
//!    sets for every secondary dimension, and sums of numeric facts.
//! 3. **Clamp**: `observations = max(observations, entities)`, then
//!    `exceptions = min(exceptions, observations)`. Mixed-granularity inputs (pre-summarized
//!    rows next to single observations) can break the natural ordering of the counters;
//!    the clamp restores it and reports the adjustment on the
//!    `campaign_rollup::data_quality` target.
//! 4. **Derive**: `exception_rate = exceptions / max(observations, entities)`, or `0` when
//!    the denominator is `0`.
//!
//! The engine holds configuration only. Empty input, or a dimension no record carries,
//! yields an empty map.

use crate::config::RankingConfig;
use crate::models::{DetailRecord, Dimension, Fact, GroupAggregate};
use std::collections::{BTreeMap, HashSet};

const DATA_QUALITY: &str = "campaign_rollup::data_quality";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupEngine {
    entity_dimension: Dimension,
    secondary_dimensions: Vec<Dimension>,
}

impl RollupEngine {
    pub fn new(entity_dimension: impl Into<Dimension>) -> Self {
        Self {
            entity_dimension: entity_dimension.into(),
            secondary_dimensions: Vec::new(),
        }
    }

    pub fn with_secondary_dimensions<I, D>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dimension>,
    {
        self.secondary_dimensions = dimensions.into_iter().map(Into::into).collect();
        self.secondary_dimensions.sort();
        self.secondary_dimensions.dedup();
        self
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.entity_dimension.as_str())
            .with_secondary_dimensions(config.secondary_dimensions.iter().map(String::as_str))
    }

    pub fn entity_dimension(&self) -> &Dimension {
        &self.entity_dimension
    }

    pub fn secondary_dimensions(&self) -> &[Dimension] {
        &self.secondary_dimensions
    }

    pub fn rollup<'a, I>(&self, records: I, dimension: &Dimension) -> BTreeMap<String, GroupAggregate>
    where
        I: IntoIterator<Item = &'a DetailRecord>,
    {
        let mut groups: BTreeMap<&str, GroupAccumulator<'_>> = BTreeMap::new();
        let mut seen = 0usize;
        let mut excluded = 0usize;

        for record in records {
            seen += 1;
            let Some(group_key) = record.key(dimension.as_str()) else {
                excluded += 1;
                continue;
            };

            groups
                .entry(group_key)
                .or_insert_with(|| GroupAccumulator::new(&self.secondary_dimensions, dimension))
                .add(record, &self.entity_dimension);
        }

        let result: BTreeMap<String, GroupAggregate> = groups
            .into_iter()
            .map(|(group_key, accumulator)| {
                (group_key.to_string(), accumulator.finish(group_key, dimension))
            })
            .collect();

        tracing::debug!(
            dimension = %dimension,
            entity_dimension = %self.entity_dimension,
            records = seen,
            excluded = excluded,
            groups = result.len(),
            clamped = result.values().filter(|group| group.clamped).count(),
            "Rollup complete"
        );

        result
    }
}

struct GroupAccumulator<'a> {
    observations: u64,
    exceptions: u64,
    entities: HashSet<&'a str>,
    exception_entities: HashSet<&'a str>,
    secondary: BTreeMap<&'a Dimension, HashSet<&'a str>>,
    facts: BTreeMap<&'a Fact, f64>,
}

impl<'a> GroupAccumulator<'a> {
    fn new(secondary_dimensions: &'a [Dimension], grouping: &Dimension) -> Self {
        let secondary = secondary_dimensions
            .iter()
            .filter(|dimension| *dimension != grouping)
            .map(|dimension| (dimension, HashSet::new()))
            .collect();

        Self {
            observations: 0,
            exceptions: 0,
            entities: HashSet::new(),
            exception_entities: HashSet::new(),
            secondary,
            facts: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &'a DetailRecord, entity_dimension: &Dimension) {
        let exception_weight = record.exception_weight();
        self.observations = self.observations.saturating_add(record.observation_weight());
        self.exceptions = self.exceptions.saturating_add(exception_weight);

        if let Some(entity) = record.key(entity_dimension.as_str()) {
            self.entities.insert(entity);
            if exception_weight > 0 {
                self.exception_entities.insert(entity);
            }
        }

        for (dimension, values) in self.secondary.iter_mut() {
            if let Some(value) = record.key(dimension.as_str()) {
                values.insert(value);
            }
        }

        for (fact, value) in record.numeric_facts() {
            if !value.is_finite() || *value < 0.0 {
                tracing::debug!(
                    target: DATA_QUALITY,
                    fact = %fact,
                    value = *value,
                    timestamp = %record.timestamp(),
                    "Ignoring non-finite or negative fact value"
                );
                continue;
            }

            let total = self.facts.entry(fact).or_insert(0.0);
            let sum = *total + value;
            if sum.is_finite() {
                *total = sum;
            } else {
                tracing::debug!(
                    target: DATA_QUALITY,
                    fact = %fact,
                    "Fact total overflowed, saturating"
                );
                *total = f64::MAX;
            }
        }
    }

    fn finish(self, group_key: &str, dimension: &Dimension) -> GroupAggregate {
        let monitored = self.entities.len() as u64;
        let (observations, exceptions) =
            clamp_counters(self.observations, self.exceptions, monitored);
        let clamped = observations != self.observations || exceptions != self.exceptions;

        if clamped {
            tracing::debug!(
                target: DATA_QUALITY,
                dimension = %dimension,
                group = group_key,
                raw_observations = self.observations,
                raw_exceptions = self.exceptions,
                monitored_entities = monitored,
                observations = observations,
                exceptions = exceptions,
                "Clamped inconsistent group counters"
            );
        }

        GroupAggregate {
            group_key: group_key.to_string(),
            monitored_entity_count: monitored,
            exception_entity_count: self.exception_entities.len() as u64,
            observation_count: observations,
            exception_count: exceptions,
            exception_rate: exception_rate(exceptions, observations, monitored),
            secondary_counts: self
                .secondary
                .into_iter()
                .map(|(dimension, values)| (dimension.clone(), values.len() as u64))
                .collect(),
            fact_totals: self
                .facts
                .into_iter()
                .map(|(fact, total)| (fact.clone(), total))
                .collect(),
            clamped,
        }
    }
}

/// Observations are raised to at least the entity count, then exceptions are capped by
/// the raised observations. Returns `(observations, exceptions)`.
pub fn clamp_counters(observations: u64, exceptions: u64, monitored_entities: u64) -> (u64, u64) {
    let observations = observations.max(monitored_entities);
    let exceptions = exceptions.min(observations);
    (observations, exceptions)
}

pub fn exception_rate(exceptions: u64, observations: u64, monitored_entities: u64) -> f64 {
    let denominator = observations.max(monitored_entities);
    if denominator == 0 {
        0.0
    } else {
        (exceptions as f64 / denominator as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
    }

    fn price_check(province: &str, commodity: &str, is_break: bool) -> DetailRecord {
        DetailRecord::new(at(0))
            .with_key("province", province)
            .with_key("commodity", commodity)
            .exception(is_break)
    }

    fn engine() -> RollupEngine {
        RollupEngine::new(Dimension::commodity())
    }

    #[test]
    fn test_single_province_counts() {
        let records = vec![
            price_check("A", "SKU1", true),
            price_check("A", "SKU1", false),
            price_check("A", "SKU2", false),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        let a = &groups["A"];
        assert_eq!(groups.len(), 1);
        assert_eq!(a.observation_count, 3);
        assert_eq!(a.exception_count, 1);
        assert_eq!(a.monitored_entity_count, 2);
        assert_eq!(a.exception_entity_count, 1);
        assert!((a.exception_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!(!a.clamped);
    }

    #[test]
    fn test_empty_input_and_unknown_dimension() {
        let none: Vec<DetailRecord> = Vec::new();
        assert!(engine().rollup(&none, &Dimension::province()).is_empty());

        let records = vec![price_check("A", "SKU1", false)];
        assert!(engine().rollup(&records, &Dimension::mechanism()).is_empty());
    }

    #[test]
    fn test_records_without_key_are_excluded() {
        let records = vec![
            price_check("A", "SKU1", true),
            DetailRecord::new(at(1)).with_key("commodity", "SKU9").exception(true),
        ];

        let by_province = engine().rollup(&records, &Dimension::province());
        assert_eq!(by_province.len(), 1);
        assert_eq!(by_province["A"].exception_count, 1);

        // Still participates along a dimension it does carry
        let by_commodity = engine().rollup(&records, &Dimension::commodity());
        assert_eq!(by_commodity.len(), 2);
        assert_eq!(by_commodity["SKU9"].observation_count, 1);
    }

    #[test]
    fn test_secondary_counts_skip_grouping_dimension() {
        let engine = engine().with_secondary_dimensions(["retailer", "province", "city"]);
        let records = vec![
            price_check("A", "SKU1", false).with_key("retailer", "R1"),
            price_check("A", "SKU2", false).with_key("retailer", "R2"),
            price_check("A", "SKU2", false).with_key("retailer", "R1"),
        ];

        let groups = engine.rollup(&records, &Dimension::province());
        let counts = &groups["A"].secondary_counts;
        assert_eq!(counts.get("retailer"), Some(&2));
        assert_eq!(counts.get("city"), Some(&0));
        assert!(!counts.contains_key("province"));
    }

    #[test]
    fn test_fact_totals_ignore_non_finite() {
        let records = vec![
            price_check("A", "SKU1", false).with_fact("amount", 10.0),
            price_check("A", "SKU2", false).with_fact("amount", 2.5),
            price_check("A", "SKU2", false).with_fact("amount", f64::INFINITY),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        assert_eq!(groups["A"].fact_totals.get("amount"), Some(&12.5));
    }

    #[test]
    fn test_negative_fact_values_are_ignored() {
        let records = vec![
            price_check("A", "SKU1", false).with_fact("amount", 10.0),
            price_check("B", "SKU2", false).with_fact("amount", -5.0),
            price_check("B", "SKU3", false).with_fact("amount", 3.0),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        assert_eq!(groups["A"].fact_totals.get("amount"), Some(&10.0));
        assert_eq!(groups["B"].fact_totals.get("amount"), Some(&3.0));
    }

    #[test]
    fn test_fact_total_saturates_instead_of_overflowing() {
        let records = vec![
            price_check("A", "SKU1", false).with_fact("amount", 1e308),
            price_check("A", "SKU2", false).with_fact("amount", 1e308),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        let total = groups["A"].fact_totals["amount"];
        assert!(total.is_finite());
        assert_eq!(total, f64::MAX);
    }

    #[test]
    fn test_summary_rows_exceeding_observations_are_clamped() {
        // Pre-summarized row claims 7 breaks out of 2 checks
        let records = vec![
            DetailRecord::new(at(0))
                .with_key("province", "A")
                .with_key("commodity", "SKU1")
                .with_fact(Fact::OBSERVATIONS, 2.0)
                .with_fact(Fact::EXCEPTIONS, 7.0),
            price_check("A", "SKU2", false),
            price_check("A", "SKU3", false),
            price_check("A", "SKU4", false),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        let a = &groups["A"];
        assert!(a.clamped);
        assert_eq!(a.monitored_entity_count, 4);
        assert_eq!(a.observation_count, 5);
        assert_eq!(a.exception_count, 5);
        assert_eq!(a.exception_entity_count, 1);
        assert_eq!(a.exception_rate, 1.0);
        assert!(a.is_consistent());
    }

    #[test]
    fn test_entities_beyond_observations_raise_observations() {
        let records = vec![
            DetailRecord::new(at(0))
                .with_key("province", "B")
                .with_key("commodity", "SKU1")
                .with_fact(Fact::OBSERVATIONS, 0.0),
            DetailRecord::new(at(1))
                .with_key("province", "B")
                .with_key("commodity", "SKU2")
                .with_fact(Fact::OBSERVATIONS, 0.0)
                .exception(true),
        ];

        let groups = engine().rollup(&records, &Dimension::province());
        let b = &groups["B"];
        assert_eq!(b.observation_count, 2);
        assert_eq!(b.exception_count, 1);
        assert_eq!(b.exception_rate, 0.5);
        assert!(b.clamped);
    }

    #[test]
    fn test_clamp_and_rate_helpers() {
        assert_eq!(clamp_counters(3, 9, 1), (3, 3));
        assert_eq!(clamp_counters(1, 4, 6), (6, 4));
        assert_eq!(clamp_counters(0, 0, 0), (0, 0));
        assert_eq!(exception_rate(0, 0, 0), 0.0);
        assert_eq!(exception_rate(2, 1, 4), 0.5);
    }
}
