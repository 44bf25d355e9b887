//! Core Data Models
//!
//! This module defines the data structures that flow through the rollup pipeline, from
//! raw detail records to ranked leaderboards.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`DetailRecord`] - one observed event (a redemption, a price check, a sale line)
//! 2. **Aggregation**: [`GroupAggregate`] - counters and rates for one value of a dimension
//! 3. **Output**: [`RankedView`] / [`RankedEntry`] - sorted, truncated leaderboard with shares
//!
//! ## Selection Types
//!
//! - [`Dimension`] / [`Fact`] - data-driven names for groupable keys and numeric quantities
//! - [`Metric`] - the value a leaderboard is ranked by
//! - [`Scope`] - optional narrowing of the population to one value of some dimension
//! - [`TimeWindow`] - optional inclusive date range applied together with the scope
//!
//! Every type here is a plain value: records are immutable once built, and aggregates
//! and views are recomputed from records on every selection change.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of a categorical attribute records can be grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(String);

impl Dimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn province() -> Self {
        Self::new("province")
    }

    pub fn city() -> Self {
        Self::new("city")
    }

    pub fn commodity() -> Self {
        Self::new("commodity")
    }

    pub fn retailer() -> Self {
        Self::new("retailer")
    }

    pub fn sku() -> Self {
        Self::new("sku")
    }

    pub fn mechanism() -> Self {
        Self::new("mechanism")
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dimension {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Dimension {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Dimension {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Name of a numeric quantity attached to a record (amount, discount, quantity...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fact(String);

impl Fact {
    /// Reserved fact: number of observations a pre-summarized row stands for.
    pub const OBSERVATIONS: &'static str = "observations";
    /// Reserved fact: number of exception events a pre-summarized row stands for.
    pub const EXCEPTIONS: &'static str = "exceptions";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fact {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Fact {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Fact {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One observed event.
///
/// Fields are private: a record is assembled once with the consuming builder methods
/// and is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(deserialize_with = "crate::timestamp_parser::deserialize")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "dimensionKeys", default)]
    dimension_keys: BTreeMap<Dimension, String>,
    #[serde(rename = "isException", default)]
    is_exception: bool,
    #[serde(rename = "numericFacts", default)]
    numeric_facts: BTreeMap<Fact, f64>,
}

impl DetailRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            dimension_keys: BTreeMap::new(),
            is_exception: false,
            numeric_facts: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, dimension: impl Into<Dimension>, value: impl Into<String>) -> Self {
        self.dimension_keys.insert(dimension.into(), value.into());
        self
    }

    pub fn with_fact(mut self, fact: impl Into<Fact>, value: f64) -> Self {
        self.numeric_facts.insert(fact.into(), value);
        self
    }

    pub fn exception(mut self, is_exception: bool) -> Self {
        self.is_exception = is_exception;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Value of this record along `dimension`, if it carries one.
    pub fn key(&self, dimension: &str) -> Option<&str> {
        self.dimension_keys.get(dimension).map(String::as_str)
    }

    pub fn dimension_keys(&self) -> &BTreeMap<Dimension, String> {
        &self.dimension_keys
    }

    pub fn is_exception(&self) -> bool {
        self.is_exception
    }

    pub fn fact(&self, fact: &str) -> Option<f64> {
        self.numeric_facts.get(fact).copied()
    }

    pub fn numeric_facts(&self) -> &BTreeMap<Fact, f64> {
        &self.numeric_facts
    }

    /// Observations this record contributes: 1, or the `observations` fact of a
    /// pre-summarized row.
    pub fn observation_weight(&self) -> u64 {
        self.fact(Fact::OBSERVATIONS).map_or(1, count_from_fact)
    }

    /// Exception events this record contributes: the `exceptions` fact when present,
    /// otherwise 1 for a flagged record and 0 for a routine one.
    pub fn exception_weight(&self) -> u64 {
        self.fact(Fact::EXCEPTIONS)
            .map_or(u64::from(self.is_exception), count_from_fact)
    }
}

fn count_from_fact(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Rollup output for one value of the active dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAggregate {
    pub group_key: String,
    pub monitored_entity_count: u64,
    pub exception_entity_count: u64,
    pub observation_count: u64,
    pub exception_count: u64,
    pub exception_rate: f64,
    pub secondary_counts: BTreeMap<Dimension, u64>,
    pub fact_totals: BTreeMap<Fact, f64>,
    /// Set when the consistency clamp had to adjust this group's counters.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clamped: bool,
}

impl GroupAggregate {
    pub fn new(group_key: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            monitored_entity_count: 0,
            exception_entity_count: 0,
            observation_count: 0,
            exception_count: 0,
            exception_rate: 0.0,
            secondary_counts: BTreeMap::new(),
            fact_totals: BTreeMap::new(),
            clamped: false,
        }
    }

    /// Whether both counter chains hold:
    /// `observations >= exceptions >= exception entities` and
    /// `observations >= monitored entities >= exception entities`.
    pub fn is_consistent(&self) -> bool {
        self.observation_count >= self.exception_count
            && self.exception_count >= self.exception_entity_count
            && self.observation_count >= self.monitored_entity_count
            && self.monitored_entity_count >= self.exception_entity_count
            && (0.0..=1.0).contains(&self.exception_rate)
    }
}

/// The value a leaderboard is ranked by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Metric {
    ObservationCount,
    ExceptionCount,
    MonitoredEntityCount,
    ExceptionEntityCount,
    ExceptionRate,
    /// Distinct values of a secondary dimension within the group.
    SecondaryCount(Dimension),
    /// Sum of a numeric fact within the group.
    FactTotal(Fact),
}

impl Metric {
    pub fn value(&self, group: &GroupAggregate) -> f64 {
        match self {
            Self::ObservationCount => group.observation_count as f64,
            Self::ExceptionCount => group.exception_count as f64,
            Self::MonitoredEntityCount => group.monitored_entity_count as f64,
            Self::ExceptionEntityCount => group.exception_entity_count as f64,
            Self::ExceptionRate => group.exception_rate,
            Self::SecondaryCount(dimension) => group
                .secondary_counts
                .get(dimension)
                .map_or(0.0, |count| *count as f64),
            Self::FactTotal(fact) => group.fact_totals.get(fact).copied().unwrap_or(0.0),
        }
    }

    /// Short label used as a column header.
    pub fn label(&self) -> String {
        match self {
            Self::ObservationCount => "Observations".to_string(),
            Self::ExceptionCount => "Exceptions".to_string(),
            Self::MonitoredEntityCount => "Entities".to_string(),
            Self::ExceptionEntityCount => "Exception entities".to_string(),
            Self::ExceptionRate => "Exception rate".to_string(),
            Self::SecondaryCount(dimension) => format!("Distinct {}", dimension),
            Self::FactTotal(fact) => format!("Total {}", fact),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObservationCount => f.write_str("observations"),
            Self::ExceptionCount => f.write_str("exceptions"),
            Self::MonitoredEntityCount => f.write_str("entities"),
            Self::ExceptionEntityCount => f.write_str("exception-entities"),
            Self::ExceptionRate => f.write_str("exception-rate"),
            Self::SecondaryCount(dimension) => write!(f, "distinct:{}", dimension),
            Self::FactTotal(fact) => write!(f, "sum:{}", fact),
        }
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(dimension) = trimmed.strip_prefix("distinct:") {
            if dimension.is_empty() {
                bail!("Metric '{}' is missing a dimension name", s);
            }
            return Ok(Self::SecondaryCount(Dimension::new(dimension)));
        }
        if let Some(fact) = trimmed.strip_prefix("sum:") {
            if fact.is_empty() {
                bail!("Metric '{}' is missing a fact name", s);
            }
            return Ok(Self::FactTotal(Fact::new(fact)));
        }

        match trimmed.to_ascii_lowercase().replace('_', "-").as_str() {
            "observations" | "observation-count" => Ok(Self::ObservationCount),
            "exceptions" | "exception-count" => Ok(Self::ExceptionCount),
            "entities" | "monitored-entity-count" => Ok(Self::MonitoredEntityCount),
            "exception-entities" | "exception-entity-count" => Ok(Self::ExceptionEntityCount),
            "exception-rate" | "rate" => Ok(Self::ExceptionRate),
            _ => bail!(
                "Unknown metric '{}'. Use observations, exceptions, entities, \
                 exception-entities, exception-rate, distinct:<dimension> or sum:<fact>",
                s
            ),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Population narrowing applied before rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    All,
    Only { dimension: Dimension, value: String },
}

impl Scope {
    pub fn only(dimension: impl Into<Dimension>, value: impl Into<String>) -> Self {
        Self::Only {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Records lacking the scope dimension never match a narrowed scope.
    pub fn matches(&self, record: &DetailRecord) -> bool {
        match self {
            Self::All => true,
            Self::Only { dimension, value } => record.key(dimension.as_str()) == Some(value.as_str()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only { dimension, value } => write!(f, "{}={}", dimension, value),
        }
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match trimmed.split_once('=') {
            Some((dimension, value)) if !dimension.trim().is_empty() && !value.trim().is_empty() => {
                Ok(Self::only(dimension.trim(), value.trim()))
            }
            _ => bail!("Invalid scope '{}'. Use 'all' or '<dimension>=<value>'", s),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Inclusive time range; an open bound matches everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { since, until }
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        match (&self.since, &self.until) {
            (Some(since), Some(until)) => timestamp >= *since && timestamp <= *until,
            (Some(since), None) => timestamp >= *since,
            (None, Some(until)) => timestamp <= *until,
            (None, None) => true,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based position in the view.
    pub rank: usize,
    #[serde(flatten)]
    pub aggregate: GroupAggregate,
    pub metric_value: f64,
    pub contribution_percent: f64,
}

/// Sorted, truncated leaderboard for one dimension/metric/scope selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedView {
    pub dimension: Dimension,
    pub metric: Metric,
    pub scope: Scope,
    #[serde(skip_serializing_if = "TimeWindow::is_unbounded")]
    pub window: TimeWindow,
    /// Sum of the metric over every group of the scoped population, before truncation.
    pub scoped_total: f64,
    /// Number of groups before truncation.
    pub group_count: usize,
    pub entries: Vec<RankedEntry>,
}

impl RankedView {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.aggregate.group_key.as_str())
            .collect()
    }

    pub fn is_truncated(&self) -> bool {
        self.entries.len() < self.group_count
    }
}
