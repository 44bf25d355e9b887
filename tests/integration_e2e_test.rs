//! End-to-end tests: record files on disk through the loader, leaderboard and analyzer

mod common;

use campaign_rollup::analyzer::{CampaignAnalyzer, ReportOptions};
use campaign_rollup::config::Config;
use campaign_rollup::loader::RecordLoader;
use campaign_rollup::models::{Metric, Scope, TimeWindow};
use campaign_rollup::timestamp_parser::TimestampParser;
use common::{create_test_jsonl, jsonl_line, sample_lines};
use std::fs;
use tempfile::TempDir;

fn analyzer() -> CampaignAnalyzer {
    let mut config = Config::default();
    config.ranking.secondary_dimensions = vec!["retailer".to_string()];
    CampaignAnalyzer::with_config(config)
}

fn options_for(dir: &TempDir) -> ReportOptions {
    ReportOptions {
        inputs: vec![dir.path().join("*.jsonl").to_string_lossy().into_owned()],
        ..ReportOptions::default()
    }
}

#[tokio::test]
async fn test_top_provinces_from_jsonl() {
    let dir = TempDir::new().unwrap();
    create_test_jsonl(dir.path(), "checks.jsonl", &sample_lines()).unwrap();

    let view = analyzer().top(&options_for(&dir)).await.unwrap();

    assert_eq!(view.group_keys(), vec!["Guangdong", "Hunan"]);
    assert_eq!(view.scoped_total, 4.0);
    assert_eq!(view.entries[0].contribution_percent, 75.0);
    assert_eq!(view.entries[0].aggregate.monitored_entity_count, 3);
    assert_eq!(view.entries[0].aggregate.exception_entity_count, 2);
    assert_eq!(view.entries[0].aggregate.secondary_counts["retailer"], 3);
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let mut lines = sample_lines();
    lines.insert(2, "{broken json line that should be skipped}".to_string());
    lines.push(r#"{"dimensionKeys":{"province":"Hunan"}}"#.to_string());
    let path = create_test_jsonl(dir.path(), "checks.jsonl", &lines).unwrap();

    let batch = RecordLoader::new().load_file(&path).await.unwrap();
    assert_eq!(batch.records.len(), 6);
    assert_eq!(batch.skipped, 2);

    let view = analyzer().top(&options_for(&dir)).await.unwrap();
    assert_eq!(view.scoped_total, 4.0);
}

#[tokio::test]
async fn test_multiple_files_and_json_documents() {
    let dir = TempDir::new().unwrap();
    let lines = sample_lines();
    create_test_jsonl(dir.path(), "a.jsonl", &lines[..3]).unwrap();
    create_test_jsonl(dir.path(), "b.jsonl", &lines[3..]).unwrap();

    let wrapped = format!(
        r#"{{"records": [{}]}}"#,
        jsonl_line("2024-09-04T08:00:00Z", "Hunan", "SKU9", "R9", true, 1.0)
    );
    fs::write(dir.path().join("extra.json"), wrapped).unwrap();

    let options = ReportOptions {
        inputs: vec![
            dir.path().join("*.jsonl").to_string_lossy().into_owned(),
            dir.path().join("*.json").to_string_lossy().into_owned(),
        ],
        ..ReportOptions::default()
    };
    let view = analyzer().top(&options).await.unwrap();

    assert_eq!(view.scoped_total, 5.0);
    assert_eq!(view.entries[1].aggregate.group_key, "Hunan");
    assert_eq!(view.entries[1].aggregate.exception_count, 2);
}

#[tokio::test]
async fn test_scope_window_and_metric_options() {
    let dir = TempDir::new().unwrap();
    create_test_jsonl(dir.path(), "checks.jsonl", &sample_lines()).unwrap();

    let options = ReportOptions {
        dimension: "retailer".into(),
        metric: "sum:amount".parse::<Metric>().unwrap(),
        scope: Scope::only("province", "Guangdong"),
        window: TimeWindow::new(
            None,
            Some(TimestampParser::parse_day_end("2024-09-01").unwrap()),
        ),
        ..options_for(&dir)
    };
    let view = analyzer().top(&options).await.unwrap();

    assert_eq!(view.group_keys(), vec!["R2", "R1"]);
    assert_eq!(view.scoped_total, 22.0);
}

#[tokio::test]
async fn test_limit_and_show_all() {
    let dir = TempDir::new().unwrap();
    create_test_jsonl(dir.path(), "checks.jsonl", &sample_lines()).unwrap();

    let limited = ReportOptions {
        dimension: "commodity".into(),
        metric: Metric::ObservationCount,
        limit: Some(1),
        ..options_for(&dir)
    };
    let view = analyzer().top(&limited).await.unwrap();
    assert_eq!(view.group_keys(), vec!["SKU1"]);
    assert_eq!(view.group_count, 4);
    assert!(view.is_truncated());

    let all = ReportOptions {
        show_all: true,
        ..limited
    };
    let view = analyzer().top(&all).await.unwrap();
    assert_eq!(view.len(), 4);
    assert_eq!(&view.group_keys()[1..], &["SKU2", "SKU3", "SKU4"]);
}

#[tokio::test]
async fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = analyzer().top(&options_for(&dir)).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No input files match"));
}
