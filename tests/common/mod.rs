#![allow(dead_code)]

use anyhow::Result;
use campaign_rollup::DetailRecord;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, d, 10, 0, 0).unwrap()
}

/// A price-break observation: one commodity checked in one province/city.
pub fn price_check(province: &str, city: &str, commodity: &str, is_break: bool) -> DetailRecord {
    DetailRecord::new(day(1))
        .with_key("province", province)
        .with_key("city", city)
        .with_key("commodity", commodity)
        .exception(is_break)
}

/// JSONL line in the record wire format.
pub fn jsonl_line(date: &str, province: &str, commodity: &str, retailer: &str, is_break: bool, amount: f64) -> String {
    format!(
        r#"{{"timestamp":"{}","dimensionKeys":{{"province":"{}","commodity":"{}","retailer":"{}"}},"isException":{},"numericFacts":{{"amount":{}}}}}"#,
        date, province, commodity, retailer, is_break, amount
    )
}

pub fn create_test_jsonl(dir: &Path, filename: &str, lines: &[String]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, lines.join("\n") + "\n")?;
    Ok(file_path)
}

/// Two provinces over three days; Guangdong has 3 breaks, Hunan 1.
pub fn sample_lines() -> Vec<String> {
    vec![
        jsonl_line("2024-09-01T08:00:00Z", "Guangdong", "SKU1", "R1", true, 10.0),
        jsonl_line("2024-09-01T09:00:00Z", "Guangdong", "SKU1", "R2", true, 12.0),
        jsonl_line("2024-09-02T09:00:00Z", "Guangdong", "SKU2", "R1", false, 8.0),
        jsonl_line("2024-09-02T10:00:00Z", "Guangdong", "SKU3", "R3", true, 5.0),
        jsonl_line("2024-09-03T11:00:00Z", "Hunan", "SKU1", "R4", true, 7.5),
        jsonl_line("2024-09-03T12:00:00Z", "Hunan", "SKU4", "R4", false, 2.5),
    ]
}
