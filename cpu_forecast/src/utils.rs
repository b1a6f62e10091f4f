//! Utility functions for the cpu_forecast crate

use crate::error::Result;
use crate::rollout::ForecastPoint;
use chrono::{NaiveDateTime, Timelike};
use std::path::Path;

/// Truncate a timestamp down to the start of its minute
pub fn floor_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// Write forecast points to a CSV file using the wire field names
pub fn write_forecast_csv<P: AsRef<Path>>(points: &[ForecastPoint], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read forecast points back from a CSV file written by [`write_forecast_csv`]
pub fn read_forecast_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ForecastPoint>> {
    let mut reader = csv::Reader::from_path(path)?;
    let points = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ForecastPoint>, csv::Error>>()?;
    Ok(points)
}

/// Serialize forecast points as a JSON array of records
pub fn forecast_to_json(points: &[ForecastPoint]) -> Result<String> {
    Ok(serde_json::to_string(points)?)
}

pub mod timestamp_parser {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATETIME_FORMATS: [&str; 10] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

    /// Parse a timestamp string, returning `None` when no known format matches.
    ///
    /// Offsets in RFC 3339 input are dropped and the wall-clock time kept.
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(parsed) = DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        {
            return Some(parsed);
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.naive_local());
        }

        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}
