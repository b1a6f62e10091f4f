//! Raw telemetry loading and type coercion

use crate::error::{ForecastError, Result};
use crate::utils::timestamp_parser;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use fleet_calendar::ServiceCategory;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Column holding the server (entity) identifier
pub const SERVER_ID: &str = "server_id";
/// Optional column holding the service instance identifier
pub const SERVICE_ID: &str = "service_id";
/// Column holding the metric category, as label or integer code
pub const SERVICE_DESCRIPTION: &str = "service_description";
pub const TIMESTAMP: &str = "Timestamp";
pub const CPU_PERCENT: &str = "CPU_percent";
pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_WEEKEND: &str = "is_weekend";
pub const IS_WORKING_HOUR: &str = "is_working_hour";
/// Optional column holding the season, as label or integer code
pub const SEASON: &str = "season";

/// Columns every telemetry table must provide
pub const REQUIRED_COLUMNS: [&str; 8] = [
    SERVER_ID,
    TIMESTAMP,
    SERVICE_DESCRIPTION,
    CPU_PERCENT,
    HOUR,
    DAY_OF_WEEK,
    IS_WEEKEND,
    IS_WORKING_HOUR,
];

/// Season as supplied by the raw data, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeasonInput {
    Label(String),
    Code(i64),
}

/// One observed measurement after type coercion
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub server_id: i64,
    pub service_id: Option<i64>,
    pub service: ServiceCategory,
    /// Absent when the raw value could not be parsed
    pub timestamp: Option<NaiveDateTime>,
    /// Absent when the raw value was null or NaN
    pub cpu_percent: Option<f32>,
    pub hour: i8,
    pub day_of_week: i8,
    pub is_weekend: i8,
    pub is_working_hour: i8,
    /// Absent when the season column is missing or null
    pub season: Option<SeasonInput>,
}

/// Tabular telemetry as received from the upstream data source
#[derive(Debug, Clone)]
pub struct TelemetryData {
    df: DataFrame,
}

/// Data loader for telemetry tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load telemetry from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TelemetryData> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        info!("Loaded {} rows from {}", df.height(), path.display());
        Self::from_dataframe(df)
    }

    /// Wrap an existing DataFrame, checking that the required columns exist
    pub fn from_dataframe(df: DataFrame) -> Result<TelemetryData> {
        let column_names = df.get_column_names();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !column_names.contains(required))
            .collect();

        if !missing.is_empty() {
            return Err(ForecastError::SchemaError(format!(
                "Required column(s) missing: {}",
                missing.join(", ")
            )));
        }

        Ok(TelemetryData { df })
    }
}

impl TelemetryData {
    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of raw rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Distinct server identifiers, ascending
    pub fn server_ids(&self) -> Result<Vec<i64>> {
        let mut ids = self.integer_column(SERVER_ID)?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Coerce every row into a typed sample.
    ///
    /// Category labels are mapped through the closed enumeration, integer
    /// and flag columns are strictly coerced and timestamps that fail to
    /// parse become absent. Any structural problem fails the whole call.
    pub fn samples(&self) -> Result<Vec<RawSample>> {
        let server_ids = self.integer_column(SERVER_ID)?;
        let service_ids = if self.has_column(SERVICE_ID) {
            Some(self.integer_column(SERVICE_ID)?)
        } else {
            None
        };
        let services = self.service_column()?;
        let timestamps = self.timestamp_column()?;
        let cpu = self.float_column(CPU_PERCENT)?;
        let hours = self.flag_column(HOUR)?;
        let days = self.flag_column(DAY_OF_WEEK)?;
        let weekends = self.flag_column(IS_WEEKEND)?;
        let working = self.flag_column(IS_WORKING_HOUR)?;
        let seasons = self.season_column()?;

        let samples = (0..self.df.height())
            .map(|i| RawSample {
                server_id: server_ids[i],
                service_id: service_ids.as_ref().map(|ids| ids[i]),
                service: services[i],
                timestamp: timestamps[i],
                cpu_percent: cpu[i],
                hour: hours[i],
                day_of_week: days[i],
                is_weekend: weekends[i],
                is_working_hour: working[i],
                season: seasons[i].clone(),
            })
            .collect();

        Ok(samples)
    }

    fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().contains(&name)
    }

    fn column(&self, name: &str) -> Result<&Series> {
        self.df.column(name).map_err(|_| {
            ForecastError::SchemaError(format!("Required column '{}' is missing", name))
        })
    }

    /// Strictly coerce a column to i64; nulls are not allowed
    fn integer_column(&self, name: &str) -> Result<Vec<i64>> {
        let series = self.column(name)?;
        let coerced = series.strict_cast(&DataType::Int64).map_err(|e| {
            ForecastError::SchemaError(format!(
                "Column '{}' cannot be coerced to integer: {}",
                name, e
            ))
        })?;

        coerced
            .i64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    ForecastError::SchemaError(format!(
                        "Column '{}' has a missing value at row {}",
                        name, row
                    ))
                })
            })
            .collect()
    }

    /// Integer column narrowed to i8
    fn flag_column(&self, name: &str) -> Result<Vec<i8>> {
        self.integer_column(name)?
            .into_iter()
            .map(|value| {
                i8::try_from(value).map_err(|_| {
                    ForecastError::SchemaError(format!(
                        "Column '{}' value {} does not fit in i8",
                        name, value
                    ))
                })
            })
            .collect()
    }

    /// Strictly coerce a column to f32; nulls and NaN become absent
    fn float_column(&self, name: &str) -> Result<Vec<Option<f32>>> {
        let series = self.column(name)?;
        let coerced = series.strict_cast(&DataType::Float32).map_err(|e| {
            ForecastError::SchemaError(format!(
                "Column '{}' cannot be coerced to float: {}",
                name, e
            ))
        })?;

        let values = coerced
            .f32()?
            .into_iter()
            .map(|value| value.filter(|v| !v.is_nan()))
            .collect();
        Ok(values)
    }

    fn service_column(&self) -> Result<Vec<ServiceCategory>> {
        let series = self.column(SERVICE_DESCRIPTION)?;

        match series.dtype() {
            DataType::Utf8 => series
                .utf8()?
                .into_iter()
                .enumerate()
                .map(|(row, label)| {
                    let label = label.ok_or_else(|| {
                        ForecastError::SchemaError(format!(
                            "Column '{}' has a missing value at row {}",
                            SERVICE_DESCRIPTION, row
                        ))
                    })?;
                    ServiceCategory::from_label(label).map_err(|e| {
                        ForecastError::SchemaError(format!("{} at row {}", e, row))
                    })
                })
                .collect(),
            _ => self
                .integer_column(SERVICE_DESCRIPTION)?
                .into_iter()
                .enumerate()
                .map(|(row, code)| {
                    ServiceCategory::from_code(code).map_err(|e| {
                        ForecastError::SchemaError(format!("{} at row {}", e, row))
                    })
                })
                .collect(),
        }
    }

    fn season_column(&self) -> Result<Vec<Option<SeasonInput>>> {
        if !self.has_column(SEASON) {
            return Ok(vec![None; self.df.height()]);
        }
        let series = self.column(SEASON)?;

        match series.dtype() {
            DataType::Utf8 => Ok(series
                .utf8()?
                .into_iter()
                .map(|label| label.map(|l| SeasonInput::Label(l.to_string())))
                .collect()),
            DataType::Null => Ok(vec![None; self.df.height()]),
            _ => {
                let coerced = series.strict_cast(&DataType::Int64).map_err(|e| {
                    ForecastError::SchemaError(format!(
                        "Column '{}' cannot be coerced to integer: {}",
                        SEASON, e
                    ))
                })?;
                let codes = coerced
                    .i64()?
                    .into_iter()
                    .map(|code| code.map(SeasonInput::Code))
                    .collect();
                Ok(codes)
            }
        }
    }

    /// Parse the timestamp column; values that fail to parse become absent
    fn timestamp_column(&self) -> Result<Vec<Option<NaiveDateTime>>> {
        let series = self.column(TIMESTAMP)?;

        match series.dtype() {
            DataType::Utf8 => Ok(series
                .utf8()?
                .into_iter()
                .map(|raw| raw.and_then(timestamp_parser::parse_timestamp))
                .collect()),
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                let ticks = series.cast(&DataType::Int64)?;
                let values = ticks
                    .i64()?
                    .into_iter()
                    .map(|tick| tick.and_then(|t| from_epoch(epoch_offset(t, unit))))
                    .collect();
                Ok(values)
            }
            DataType::Date => {
                let days = series.cast(&DataType::Int64)?;
                let values = days
                    .i64()?
                    .into_iter()
                    .map(|day| day.and_then(|d| from_epoch(Duration::days(d))))
                    .collect();
                Ok(values)
            }
            DataType::Null => Ok(vec![None; self.df.height()]),
            other => Err(ForecastError::SchemaError(format!(
                "Column '{}' has unsupported type {}",
                TIMESTAMP, other
            ))),
        }
    }
}

fn epoch_offset(ticks: i64, unit: TimeUnit) -> Duration {
    match unit {
        TimeUnit::Nanoseconds => Duration::nanoseconds(ticks),
        TimeUnit::Microseconds => Duration::microseconds(ticks),
        TimeUnit::Milliseconds => Duration::milliseconds(ticks),
    }
}

fn from_epoch(offset: Duration) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|epoch| epoch.checked_add_signed(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frame(services: Series, timestamps: Series) -> DataFrame {
        DataFrame::new(vec![
            Series::new(SERVER_ID, vec![7i64, 7]),
            services,
            timestamps,
            Series::new(CPU_PERCENT, vec![Some(12.5f64), None]),
            Series::new(HOUR, vec![10i64, 10]),
            Series::new(DAY_OF_WEEK, vec![0i64, 0]),
            Series::new(IS_WEEKEND, vec![0i64, 0]),
            Series::new(IS_WORKING_HOUR, vec![1i64, 1]),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_required_column() {
        let df = DataFrame::new(vec![Series::new(SERVER_ID, vec![1i64])]).unwrap();
        let err = DataLoader::from_dataframe(df).unwrap_err();
        assert!(matches!(err, ForecastError::SchemaError(_)));
        assert!(err.to_string().contains(TIMESTAMP));
    }

    #[test]
    fn test_labels_and_codes_both_normalize() {
        let labelled = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "CPU_Usage_SQL"]),
            Series::new(TIMESTAMP, vec!["2024-07-01 10:00:00", "2024-07-01 10:30:00"]),
        );
        let coded = frame(
            Series::new(SERVICE_DESCRIPTION, vec![1i64, 3]),
            Series::new(TIMESTAMP, vec!["2024-07-01 10:00:00", "2024-07-01 10:30:00"]),
        );

        let from_labels = DataLoader::from_dataframe(labelled).unwrap().samples().unwrap();
        let from_codes = DataLoader::from_dataframe(coded).unwrap().samples().unwrap();

        assert_eq!(from_labels, from_codes);
        assert_eq!(from_labels[1].service, ServiceCategory::CpuUsageSql);
        assert_eq!(from_labels[0].cpu_percent, Some(12.5));
        assert_eq!(from_labels[1].cpu_percent, None);
        assert_eq!(from_labels[0].season, None);
    }

    #[test]
    fn test_unknown_label_is_schema_error() {
        let df = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "Disk_Usage"]),
            Series::new(TIMESTAMP, vec!["2024-07-01 10:00:00", "2024-07-01 10:30:00"]),
        );
        let err = DataLoader::from_dataframe(df).unwrap().samples().unwrap_err();
        assert!(err.to_string().contains("Disk_Usage"));
    }

    #[test]
    fn test_unparseable_timestamp_becomes_absent() {
        let df = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "CPU_Usage"]),
            Series::new(TIMESTAMP, vec!["2024-07-01 10:00:00", "yesterday-ish"]),
        );
        let samples = DataLoader::from_dataframe(df).unwrap().samples().unwrap();
        assert!(samples[0].timestamp.is_some());
        assert!(samples[1].timestamp.is_none());
    }

    #[test]
    fn test_uncoercible_integer_is_schema_error() {
        let mut df = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "CPU_Usage"]),
            Series::new(TIMESTAMP, vec!["2024-07-01 10:00:00", "2024-07-01 10:30:00"]),
        );
        df.replace(HOUR, Series::new(HOUR, vec!["ten", "eleven"])).unwrap();

        let err = DataLoader::from_dataframe(df).unwrap().samples().unwrap_err();
        assert!(matches!(err, ForecastError::SchemaError(_)));
    }

    fn july_first_ten() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[rstest]
    #[case(TimeUnit::Milliseconds, 1_000)]
    #[case(TimeUnit::Microseconds, 1_000_000)]
    #[case(TimeUnit::Nanoseconds, 1_000_000_000)]
    fn test_datetime_column_is_converted(#[case] unit: TimeUnit, #[case] per_second: i64) {
        // 2024-07-01 10:00:00 UTC
        let ticks = vec![Some(1_719_828_000 * per_second), None];
        let timestamps = Series::new(TIMESTAMP, ticks)
            .cast(&DataType::Datetime(unit, None))
            .unwrap();
        let df = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "CPU_Usage"]),
            timestamps,
        );

        let samples = DataLoader::from_dataframe(df).unwrap().samples().unwrap();
        assert_eq!(samples[0].timestamp, Some(july_first_ten()));
        assert_eq!(samples[1].timestamp, None);

        let later = Series::new(TIMESTAMP, vec![Some((1_719_828_000 + 1_815) * per_second)])
            .cast(&DataType::Datetime(unit, None))
            .unwrap();
        let df = DataFrame::new(vec![
            Series::new(SERVER_ID, vec![7i64]),
            Series::new(SERVICE_DESCRIPTION, vec![1i64]),
            later,
            Series::new(CPU_PERCENT, vec![1.0f64]),
            Series::new(HOUR, vec![10i64]),
            Series::new(DAY_OF_WEEK, vec![0i64]),
            Series::new(IS_WEEKEND, vec![0i64]),
            Series::new(IS_WORKING_HOUR, vec![1i64]),
        ])
        .unwrap();
        let samples = DataLoader::from_dataframe(df).unwrap().samples().unwrap();
        assert_eq!(
            samples[0].timestamp,
            Some(july_first_ten() + Duration::seconds(1_815))
        );
    }

    #[test]
    fn test_date_column_is_converted_to_midnight() {
        // 19905 days after the epoch is 2024-07-01
        let timestamps = Series::new(TIMESTAMP, vec![Some(19_905i32), None])
            .cast(&DataType::Date)
            .unwrap();
        let df = frame(
            Series::new(SERVICE_DESCRIPTION, vec!["CPU_Usage", "CPU_Usage"]),
            timestamps,
        );

        let samples = DataLoader::from_dataframe(df).unwrap().samples().unwrap();
        assert_eq!(
            samples[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 7, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(samples[1].timestamp, None);
    }
}
