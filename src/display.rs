//! Output Formatting and Display Management
//!
//! Renders leaderboards, full rollups and the dimension catalog either as colored
//! terminal tables or as JSON for programmatic consumers (chart and map widgets).
//!
//! ## Output Formats
//!
//! ### Leaderboard
//! One line per ranked group: rank, group key, metric value, share of the scoped total,
//! and the observation/exception/entity counters. The header states the dimension,
//! metric, scope and how many groups were cut by the limit.
//!
//! ### JSON
//! The [`RankedView`] is serialized as-is (camelCase fields):
//! ```json
//! {
//!   "dimension": "province",
//!   "metric": "exceptions",
//!   "scope": "all",
//!   "scopedTotal": 6.0,
//!   "groupCount": 2,
//!   "entries": [
//!     { "rank": 1, "groupKey": "A", "observationCount": 10, "exceptionCount": 5,
//!       "metricValue": 5.0, "contributionPercent": 83.3 }
//!   ]
//! }
//! ```
//!
//! An empty view is rendered as "no data", never as an error.

use crate::cache::RollupMap;
use crate::config::OutputConfig;
use crate::models::{Dimension, Metric, RankedView};
use crate::store::RecordStore;
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Distinct values listed per dimension in the catalog view.
const CATALOG_PREVIEW: usize = 5;

pub struct LeaderboardDisplay {
    json_pretty: bool,
    percent_precision: usize,
}

impl Default for LeaderboardDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderboardDisplay {
    pub fn new() -> Self {
        Self {
            json_pretty: true,
            percent_precision: 1,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            json_pretty: config.json_pretty,
            percent_precision: config.percent_precision,
        }
    }

    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        if self.json_pretty {
            serde_json::to_string_pretty(value).context("Failed to serialize report to JSON")
        } else {
            serde_json::to_string(value).context("Failed to serialize report to JSON")
        }
    }

    pub fn display_ranked(&self, view: &RankedView, json_output: bool) -> Result<()> {
        if json_output {
            println!("{}", self.to_json(view)?);
        } else {
            print!("{}", self.render_ranked(view));
        }
        Ok(())
    }

    pub fn display_rollup(&self, dimension: &Dimension, groups: &RollupMap, json_output: bool) -> Result<()> {
        if json_output {
            let output = serde_json::json!({
                "dimension": dimension,
                "groups": groups.values().collect::<Vec<_>>(),
            });
            println!("{}", self.to_json(&output)?);
        } else {
            print!("{}", self.render_rollup(dimension, groups));
        }
        Ok(())
    }

    pub fn display_catalog(&self, store: &RecordStore, json_output: bool) -> Result<()> {
        if json_output {
            let dimensions: BTreeMap<Dimension, serde_json::Value> = store
                .dimensions()
                .into_iter()
                .map(|dimension| {
                    let values = store.distinct_values(dimension.as_str());
                    let entry = serde_json::json!({ "distinct": values.len(), "values": values });
                    (dimension, entry)
                })
                .collect();
            let time_span = store.time_span().map(|(earliest, latest)| {
                serde_json::json!({ "earliest": earliest, "latest": latest })
            });
            let output = serde_json::json!({
                "records": store.len(),
                "timeSpan": time_span,
                "dimensions": dimensions,
            });
            println!("{}", self.to_json(&output)?);
        } else {
            print!("{}", self.render_catalog(store));
        }
        Ok(())
    }

    pub fn render_ranked(&self, view: &RankedView) -> String {
        let mut out = String::new();
        let precision = self.percent_precision;

        let _ = writeln!(out, "\n{}", "=".repeat(80).bright_cyan());
        let _ = writeln!(
            out,
            "{}",
            format!("Top {} by {}", view.dimension, view.metric.label())
                .bright_white()
                .bold()
        );
        let _ = writeln!(out, "{}", "=".repeat(80).bright_cyan());

        let mut summary = format!(
            "\n{} scope {} • {} groups • total {}",
            "📊".bright_yellow(),
            view.scope.to_string().bright_white().bold(),
            view.group_count.to_string().bright_white().bold(),
            format_metric(&view.metric, view.scoped_total).bright_green().bold()
        );
        if let Some(since) = view.window.since {
            let _ = write!(summary, " • since {}", since.format("%Y-%m-%d"));
        }
        if let Some(until) = view.window.until {
            let _ = write!(summary, " • until {}", until.format("%Y-%m-%d"));
        }
        let _ = writeln!(out, "{}\n", summary);

        if view.is_empty() {
            let _ = writeln!(out, "   {}", "No data for this selection.".dimmed());
            return out;
        }

        for entry in &view.entries {
            let group = &entry.aggregate;
            let _ = writeln!(
                out,
                "{:>4}. {} - {} ({}%)",
                entry.rank.to_string().bright_white(),
                group.group_key.bright_cyan().bold(),
                format_metric(&view.metric, entry.metric_value).bright_green(),
                format!("{:.*}", precision, entry.contribution_percent).bright_yellow()
            );
            let _ = writeln!(
                out,
                "      {} observations, {} exceptions ({}%), {} entities, {} with exceptions",
                group.observation_count,
                group.exception_count,
                format!("{:.*}", precision, group.exception_rate * 100.0),
                group.monitored_entity_count,
                group.exception_entity_count
            );
            if !group.secondary_counts.is_empty() {
                let secondary: Vec<String> = group
                    .secondary_counts
                    .iter()
                    .map(|(dimension, count)| format!("{} {}", count, dimension))
                    .collect();
                let _ = writeln!(out, "      {}", secondary.join(", ").dimmed());
            }
        }

        if view.is_truncated() {
            let _ = writeln!(
                out,
                "\n   {}",
                format!("Showing {} of {} groups", view.len(), view.group_count).dimmed()
            );
        }
        out.push('\n');
        out
    }

    pub fn render_rollup(&self, dimension: &Dimension, groups: &RollupMap) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\n{} {} groups by {}\n",
            "📊".bright_yellow(),
            groups.len().to_string().bright_white().bold(),
            dimension.to_string().bright_white().bold()
        );

        if groups.is_empty() {
            let _ = writeln!(out, "   {}", "No data for this selection.".dimmed());
            return out;
        }

        for group in groups.values() {
            let flag = if group.clamped { " *".bright_red().to_string() } else { String::new() };
            let _ = writeln!(
                out,
                "   {}{}: {} observations, {} exceptions, {} entities, {} with exceptions, rate {}%",
                group.group_key.bright_cyan(),
                flag,
                group.observation_count,
                group.exception_count,
                group.monitored_entity_count,
                group.exception_entity_count,
                format!("{:.*}", self.percent_precision, group.exception_rate * 100.0).bright_yellow()
            );
        }

        if groups.values().any(|group| group.clamped) {
            let _ = writeln!(
                out,
                "\n   {}",
                "* counters adjusted for inconsistent source data".dimmed()
            );
        }
        out
    }

    pub fn render_catalog(&self, store: &RecordStore) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\n{} {} records",
            "📅".bright_blue(),
            store.len().to_string().bright_white().bold()
        );
        if let Some((earliest, latest)) = store.time_span() {
            let _ = writeln!(
                out,
                "   from {} to {}",
                earliest.format("%Y-%m-%d %H:%M"),
                latest.format("%Y-%m-%d %H:%M")
            );
        }

        let _ = writeln!(out, "\n{} Dimensions:", "📊".bright_yellow());
        let catalog = store.dimension_catalog();
        if catalog.is_empty() {
            let _ = writeln!(out, "   {}", "No data.".dimmed());
        }
        for (dimension, count) in &catalog {
            let values = store.distinct_values(dimension.as_str());
            let mut preview = values
                .iter()
                .take(CATALOG_PREVIEW)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            if values.len() > CATALOG_PREVIEW {
                preview.push_str(", ...");
            }
            let _ = writeln!(
                out,
                "   {}: {} distinct values ({})",
                dimension.to_string().bright_cyan(),
                count.to_string().bright_white().bold(),
                preview.dimmed()
            );
        }
        out
    }
}

fn format_metric(metric: &Metric, value: f64) -> String {
    match metric {
        Metric::ExceptionRate => format!("{:.3}", value),
        Metric::FactTotal(_) => format!("{:.2}", value),
        _ => format!("{:.0}", value),
    }
}
