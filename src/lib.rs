//! Campaign Rollup Library
//!
//! A dimensional rollup-and-ranking engine for marketing-analytics reports: coupon
//! redemptions, price-break observations and retailer/SKU activity are grouped along a
//! chosen dimension (province, city, commodity, retailer, SKU, mechanism), turned into
//! counters and rates, ranked by a selectable metric and truncated to a top-N leaderboard.
//!
//! ## Architecture Overview
//!
//! - [`store`] - the immutable record collection for one reporting session
//! - [`rollup`] - grouping, counter accumulation, consistency clamp, rate derivation
//! - [`ranking`] - scope/time filtering, sorting with a stable tie-break, top-N, shares
//! - [`cache`] - optional memoization of rollups across metric/limit changes
//! - [`models`] - records, aggregates, metrics, scopes and ranked views
//! - [`loader`] - JSONL/JSON record files into a store
//! - [`display`] - terminal and JSON rendering
//! - [`analyzer`] - command orchestration used by the CLI
//! - [`config`] - configuration with file and environment overrides
//! - [`logging`] - structured logging setup
//!
//! ## Example
//!
//! ```rust
//! use campaign_rollup::{DetailRecord, Metric, RankQuery, RecordStore, RollupEngine, Scope};
//! use chrono::Utc;
//!
//! let store = RecordStore::new(vec![
//!     DetailRecord::new(Utc::now())
//!         .with_key("province", "Guangdong")
//!         .with_key("commodity", "SKU123")
//!         .exception(true),
//!     DetailRecord::new(Utc::now())
//!         .with_key("province", "Hunan")
//!         .with_key("commodity", "SKU123"),
//! ]);
//!
//! let engine = RollupEngine::new("commodity");
//! let query = RankQuery::new("province", Metric::ExceptionCount).with_scope(Scope::All);
//! let view = campaign_rollup::ranking::top_n(&store, &engine, &query);
//!
//! assert_eq!(view.group_keys(), vec!["Guangdong", "Hunan"]);
//! assert_eq!(view.entries[0].contribution_percent, 100.0);
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod display;
pub mod loader;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod rollup;
pub mod store;
pub mod timestamp_parser;

pub use analyzer::CampaignAnalyzer;
pub use models::*;
pub use ranking::{Leaderboard, RankQuery};
pub use rollup::RollupEngine;
pub use store::RecordStore;
