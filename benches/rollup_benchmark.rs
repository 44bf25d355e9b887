use campaign_rollup::loader::RecordLoader;
use campaign_rollup::timestamp_parser::TimestampParser;
use campaign_rollup::{DetailRecord, Dimension, Leaderboard, Metric, RankQuery, RecordStore, RollupEngine, Scope};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;
use std::sync::Arc;

fn create_store(entries: usize) -> RecordStore {
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();

    (0..entries)
        .map(|i| {
            DetailRecord::new(start + Duration::minutes(i as i64))
                .with_key("province", format!("P{}", i % 31))
                .with_key("city", format!("C{}", i % 300))
                .with_key("commodity", format!("SKU{}", i % 2000))
                .with_key("retailer", format!("R{}", i % 150))
                .with_fact("discount", (i % 17) as f64 * 0.5)
                .exception(i % 7 == 0)
        })
        .collect()
}

fn create_jsonl(entries: usize) -> String {
    let mut content = String::new();
    for i in 0..entries {
        content.push_str(&format!(
            r#"{{"timestamp": "2024-09-01T12:{:02}:00Z", "dimensionKeys": {{"province": "P{}", "commodity": "SKU{}", "retailer": "R{}"}}, "isException": {}, "numericFacts": {{"discount": {}}}}}
"#,
            i % 60,
            i % 31,
            i % 2000,
            i % 150,
            i % 7 == 0,
            (i % 17) as f64 * 0.5
        ));
    }
    content
}

fn benchmark_rollup(c: &mut Criterion) {
    let store = create_store(50_000);
    let engine = RollupEngine::new("commodity").with_secondary_dimensions(["retailer", "city"]);
    let province = Dimension::province();

    c.bench_function("rollup_province_50000_records", |b| {
        b.iter(|| {
            let groups = engine.rollup(black_box(store.all_records()), &province);
            black_box(groups)
        })
    });
}

fn benchmark_top_n(c: &mut Criterion) {
    let store = Arc::new(create_store(50_000));
    let engine = RollupEngine::new("commodity");
    let query = RankQuery::new("city", Metric::ExceptionRate)
        .with_scope(Scope::only("province", "P3"))
        .with_limit(10);

    let uncached = Leaderboard::new(store.clone(), engine.clone());
    c.bench_function("top_n_city_scoped", |b| {
        b.iter(|| black_box(uncached.top_n(black_box(&query))))
    });

    let cached = Leaderboard::new(store, engine).with_cache(64);
    c.bench_function("top_n_city_scoped_cached", |b| {
        b.iter(|| black_box(cached.top_n(black_box(&query))))
    });
}

fn benchmark_jsonl_parsing(c: &mut Criterion) {
    let content = create_jsonl(1000);
    let loader = RecordLoader::new();

    c.bench_function("parse_jsonl_1000_records", |b| {
        b.iter(|| {
            let batch = loader.parse_jsonl(black_box(&content), Path::new("bench.jsonl"));
            black_box(batch)
        })
    });
}

fn benchmark_timestamp_parsing(c: &mut Criterion) {
    c.bench_function("parse_timestamp", |b| {
        b.iter(|| {
            let timestamp = TimestampParser::parse(black_box("2024-09-01T12:00:00Z")).unwrap();
            black_box(timestamp)
        })
    });
}

criterion_group!(
    benches,
    benchmark_rollup,
    benchmark_top_n,
    benchmark_jsonl_parsing,
    benchmark_timestamp_parsing
);
criterion_main!(benches);
