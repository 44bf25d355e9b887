//! Report Orchestration
//!
//! This module ties the pipeline together for the command line: load records, build a
//! [`Leaderboard`] with the configured engine shape, run the requested report and hand the
//! result to the display layer.
//!
//! ## Commands
//!
//! - **top**: ranked, truncated leaderboard for one dimension/metric/scope
//! - **rollup**: every group of a dimension, in key order
//! - **dimensions**: the dimension catalog with distinct values and the record time span
//!
//! Each run executes inside a `report` tracing span carrying a fresh `run_id`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use campaign_rollup::analyzer::{CampaignAnalyzer, ReportOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let analyzer = CampaignAnalyzer::new();
//! let options = ReportOptions {
//!     inputs: vec!["data/*.jsonl".to_string()],
//!     ..ReportOptions::default()
//! };
//!
//! let view = analyzer.top(&options).await?;
//! println!("{} groups", view.len());
//! # Ok(())
//! # }
//! ```

use crate::config::{get_config, Config};
use crate::display::LeaderboardDisplay;
use crate::loader::RecordLoader;
use crate::models::{Dimension, Metric, RankedView, Scope, TimeWindow};
use crate::ranking::{Leaderboard, RankQuery};
use crate::rollup::RollupEngine;
use crate::store::RecordStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub inputs: Vec<String>,
    pub dimension: Dimension,
    pub metric: Metric,
    pub scope: Scope,
    pub window: TimeWindow,
    /// `None` falls back to `ranking.default_limit`
    pub limit: Option<usize>,
    pub show_all: bool,
    pub entity_dimension: Option<Dimension>,
    pub secondary_dimensions: Option<Vec<Dimension>>,
    pub json_output: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            dimension: Dimension::province(),
            metric: Metric::ExceptionCount,
            scope: Scope::All,
            window: TimeWindow::unbounded(),
            limit: None,
            show_all: false,
            entity_dimension: None,
            secondary_dimensions: None,
            json_output: false,
        }
    }
}

pub struct CampaignAnalyzer {
    config: Config,
    loader: RecordLoader,
    display: LeaderboardDisplay,
}

impl Default for CampaignAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignAnalyzer {
    pub fn new() -> Self {
        Self::with_config(get_config().clone())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            display: LeaderboardDisplay::from_config(&config.output),
            loader: RecordLoader::new(),
            config,
        }
    }

    pub async fn load(&self, inputs: &[String]) -> Result<Arc<RecordStore>> {
        let paths = self.loader.discover_inputs(inputs)?;
        let store = self.loader.load_files(&paths).await?;
        Ok(Arc::new(store))
    }

    /// Engine from config, with per-run entity/secondary overrides applied.
    pub fn engine_for(&self, options: &ReportOptions) -> RollupEngine {
        let configured = RollupEngine::from_config(&self.config.ranking);
        if options.entity_dimension.is_none() && options.secondary_dimensions.is_none() {
            return configured;
        }

        let entity = options
            .entity_dimension
            .clone()
            .unwrap_or_else(|| configured.entity_dimension().clone());
        let secondary = options
            .secondary_dimensions
            .clone()
            .unwrap_or_else(|| configured.secondary_dimensions().to_vec());

        RollupEngine::new(entity).with_secondary_dimensions(secondary)
    }

    pub fn leaderboard(&self, store: Arc<RecordStore>, options: &ReportOptions) -> Leaderboard {
        Leaderboard::new(store, self.engine_for(options)).with_cache_config(&self.config.cache)
    }

    pub fn query_for(&self, options: &ReportOptions) -> RankQuery {
        let query = RankQuery::new(options.dimension.clone(), options.metric.clone())
            .with_scope(options.scope.clone())
            .with_window(options.window);

        if options.show_all {
            query.unlimited()
        } else {
            query.with_limit(options.limit.unwrap_or(self.config.ranking.default_limit))
        }
    }

    pub async fn top(&self, options: &ReportOptions) -> Result<RankedView> {
        let store = self.load(&options.inputs).await?;
        let leaderboard = self.leaderboard(store, options);
        Ok(leaderboard.top_n(&self.query_for(options)))
    }

    pub async fn run_command(&self, command: &str, options: ReportOptions) -> Result<()> {
        let span = tracing::info_span!("report", run_id = %Uuid::new_v4(), command = command);
        self.dispatch(command, options).instrument(span).await
    }

    async fn dispatch(&self, command: &str, options: ReportOptions) -> Result<()> {
        let store = self.load(&options.inputs).await?;
        if store.is_empty() {
            warn!("No records found in the given inputs");
        }

        match command {
            "top" => {
                let view = self.leaderboard(store, &options).top_n(&self.query_for(&options));
                self.display.display_ranked(&view, options.json_output)
            }
            "rollup" => {
                let groups = self.leaderboard(store, &options).rollup(
                    &options.dimension,
                    &options.scope,
                    &options.window,
                );
                self.display
                    .display_rollup(&options.dimension, &groups, options.json_output)
            }
            "dimensions" => self
                .display
                .display_catalog(&store, options.json_output),
            _ => {
                anyhow::bail!("Unknown command: {}", command);
            }
        }
    }
}
