//! Record Loader
//!
//! Fills a [`RecordStore`] from record files before any ranking runs. This is the only
//! asynchronous boundary of the crate: files are read concurrently with tokio, then parsed
//! synchronously.
//!
//! ## Input formats
//!
//! - **JSONL** (any extension other than `.json`): one [`DetailRecord`] per non-empty line
//! - **JSON** (`.json`): either a top-level array of records or an object with a `records`
//!   array
//!
//! Malformed JSONL lines are skipped and counted rather than failing the whole load; a
//! malformed JSON document is an error. With the `parallel` feature, JSONL lines are parsed
//! with rayon, preserving line order.

use crate::models::DetailRecord;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use glob::glob;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Records parsed from one source, plus how many lines were unusable.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub records: Vec<DetailRecord>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordLoader {}

impl RecordLoader {
    pub fn new() -> Self {
        Self {}
    }

    /// Expand glob patterns into a sorted, de-duplicated file list.
    pub fn discover_inputs(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for pattern in patterns {
            let mut matched = false;
            let paths = glob(pattern).with_context(|| format!("Invalid input pattern: {}", pattern))?;
            for entry in paths.flatten() {
                if entry.is_file() {
                    files.insert(entry);
                    matched = true;
                }
            }

            if !matched {
                anyhow::bail!("No input files match: {}", pattern);
            }
        }

        Ok(files.into_iter().collect())
    }

    /// Read every file concurrently and build a store, keeping `paths` order.
    pub async fn load_files(&self, paths: &[PathBuf]) -> Result<RecordStore> {
        let batches =
            futures::future::try_join_all(paths.iter().map(|path| self.load_file(path))).await?;

        let skipped: usize = batches.iter().map(|batch| batch.skipped).sum();
        let mut store = RecordStore::default();
        store.extend(batches.into_iter().flat_map(|batch| batch.records));

        tracing::info!(
            files = paths.len(),
            records = store.len(),
            skipped = skipped,
            "Loaded record store"
        );

        Ok(store)
    }

    pub async fn load_file(&self, path: &Path) -> Result<ParsedBatch> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read record file: {}", path.display()))?;

        self.parse_content(&content, path)
    }

    pub fn parse_content(&self, content: &str, source: &Path) -> Result<ParsedBatch> {
        let is_json = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            self.parse_json_document(content, source)
        } else {
            Ok(self.parse_jsonl(content, source))
        }
    }

    pub fn parse_jsonl(&self, content: &str, source: &Path) -> ParsedBatch {
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();

        #[cfg(feature = "parallel")]
        let parsed: Vec<Option<DetailRecord>> = lines
            .par_iter()
            .map(|(line_number, line)| parse_line(line, *line_number, source))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let parsed: Vec<Option<DetailRecord>> = lines
            .iter()
            .map(|(line_number, line)| parse_line(line, *line_number, source))
            .collect();

        let total = parsed.len();
        let records: Vec<DetailRecord> = parsed.into_iter().flatten().collect();

        ParsedBatch {
            skipped: total - records.len(),
            records,
        }
    }

    pub fn parse_json_document(&self, content: &str, source: &Path) -> Result<ParsedBatch> {
        let data: serde_json::Value = serde_json::from_str(content)
            .with_context(|| format!("Invalid JSON in {}", source.display()))?;

        // Handle both direct array format and wrapped format
        let records = if data.is_array() {
            serde_json::from_value::<Vec<DetailRecord>>(data)
        } else if let Some(records) = data.get("records") {
            serde_json::from_value::<Vec<DetailRecord>>(records.clone())
        } else {
            anyhow::bail!(
                "{} must contain an array of records or a \"records\" array",
                source.display()
            );
        }
        .with_context(|| format!("Invalid record in {}", source.display()))?;

        Ok(ParsedBatch {
            records,
            skipped: 0,
        })
    }
}

fn parse_line(line: &str, line_number: usize, source: &Path) -> Option<DetailRecord> {
    match serde_json::from_str::<DetailRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                target: "campaign_rollup::data_quality",
                file = %source.display(),
                line = line_number,
                error = %e,
                "Skipping malformed record line"
            );
            None
        }
    }
}
