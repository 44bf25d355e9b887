use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Handles parsing timestamps from the formats found in record exports
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a DateTime<Utc>
    /// Handles Z suffix, offsets, naive datetimes and plain dates
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        let trimmed = timestamp_str.trim();
        let timestamp = if trimmed.ends_with('Z') {
            trimmed.replace('Z', "+00:00")
        } else {
            trimmed.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Naive datetimes are taken as UTC
        if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }

        if let Some(start) = Self::parse_day(&timestamp)
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
        {
            return Ok(start.and_utc());
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// First instant of a YYYY-MM-DD day, for inclusive lower bounds
    pub fn parse_day_start(date_str: &str) -> Result<DateTime<Utc>> {
        Self::parse_day(date_str)?
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| anyhow::anyhow!("Invalid date: {}", date_str))
    }

    /// Last second of a YYYY-MM-DD day, for inclusive upper bounds
    pub fn parse_day_end(date_str: &str) -> Result<DateTime<Utc>> {
        Self::parse_day(date_str)?
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| anyhow::anyhow!("Invalid date: {}", date_str))
    }

    fn parse_day(date_str: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| {
            anyhow::anyhow!("Invalid date format: {}. Use YYYY-MM-DD", date_str)
        })
    }
}

/// Serde adapter so record files can use any format [`TimestampParser`] accepts.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    TimestampParser::parse(&raw).map_err(serde::de::Error::custom)
}
