//! Synthetic fleet telemetry for demos and tests

use crate::data::{self, DataLoader, TelemetryData};
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use fleet_calendar::{CalendarFeatures, ServiceCategory, WorkingHours};
use polars::prelude::{DataFrame, NamedFrom, Series};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Shape of the generated telemetry
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub server_ids: Vec<i64>,
    pub services: Vec<ServiceCategory>,
    pub start: NaiveDateTime,
    pub samples_per_series: usize,
    pub cadence_minutes: i64,
    /// Mean CPU percentage
    pub base_level: f64,
    /// Peak-to-mean amplitude of the daily cycle
    pub daily_amplitude: f64,
    /// Extra load during working hours
    pub working_hours_load: f64,
    pub noise_std: f64,
    /// Emit rows in random order, as an unsorted upstream export would
    pub shuffle: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            server_ids: vec![638939],
            services: vec![ServiceCategory::CpuUsage],
            start: NaiveDate::from_ymd_opt(2024, 7, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            samples_per_series: 7 * 48,
            cadence_minutes: 30,
            base_level: 35.0,
            daily_amplitude: 15.0,
            working_hours_load: 10.0,
            noise_std: 2.0,
            shuffle: false,
        }
    }
}

struct Row {
    server_id: i64,
    service: ServiceCategory,
    timestamp: NaiveDateTime,
    cpu_percent: f64,
    calendar: CalendarFeatures,
}

/// Deterministic part of the signal, before noise
pub fn expected_load(
    config: &SyntheticConfig,
    server_id: i64,
    service: ServiceCategory,
    timestamp: NaiveDateTime,
) -> f64 {
    let calendar = CalendarFeatures::derive(timestamp, &WorkingHours::default());
    let minute_of_day = f64::from(timestamp.hour() * 60 + timestamp.minute());
    // trough at midnight, peak at noon
    let daily = -(2.0 * PI * minute_of_day / 1440.0).cos();
    let working = if calendar.is_working_hour {
        config.working_hours_load
    } else {
        0.0
    };
    let offset = 3.0 * service.code() as f64 + server_id.rem_euclid(5) as f64;

    config.base_level + config.daily_amplitude * daily + working + offset
}

/// Generate raw telemetry with the columns the pipeline expects
pub fn generate_telemetry<R: Rng + ?Sized>(
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<TelemetryData> {
    if config.samples_per_series == 0 {
        return Err(ForecastError::InvalidParameter(
            "Samples per series must be positive".to_string(),
        ));
    }
    if config.cadence_minutes <= 0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Cadence must be a positive number of minutes, got {}",
            config.cadence_minutes
        )));
    }
    let noise = Normal::new(0.0, config.noise_std)
        .map_err(|e| ForecastError::InvalidParameter(format!("Invalid noise: {}", e)))?;

    let cadence = Duration::minutes(config.cadence_minutes);
    let mut rows = Vec::new();

    for &server_id in &config.server_ids {
        for &service in &config.services {
            let mut timestamp = config.start;
            for _ in 0..config.samples_per_series {
                let load = expected_load(config, server_id, service, timestamp)
                    + noise.sample(rng);
                rows.push(Row {
                    server_id,
                    service,
                    timestamp,
                    cpu_percent: load.clamp(0.0, 100.0),
                    calendar: CalendarFeatures::derive(timestamp, &WorkingHours::default()),
                });
                timestamp += cadence;
            }
        }
    }

    if config.shuffle {
        rows.shuffle(rng);
    }

    let df = DataFrame::new(vec![
        Series::new(
            data::SERVER_ID,
            rows.iter().map(|r| r.server_id).collect::<Vec<i64>>(),
        ),
        Series::new(
            data::SERVICE_ID,
            rows.iter()
                .map(|r| r.server_id * 10 + r.service.code())
                .collect::<Vec<i64>>(),
        ),
        Series::new(
            data::SERVICE_DESCRIPTION,
            rows.iter().map(|r| r.service.label()).collect::<Vec<&str>>(),
        ),
        Series::new(
            data::TIMESTAMP,
            rows.iter()
                .map(|r| r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                .collect::<Vec<String>>(),
        ),
        Series::new(
            data::CPU_PERCENT,
            rows.iter().map(|r| r.cpu_percent).collect::<Vec<f64>>(),
        ),
        Series::new(
            data::HOUR,
            rows.iter()
                .map(|r| i64::from(r.calendar.hour))
                .collect::<Vec<i64>>(),
        ),
        Series::new(
            data::DAY_OF_WEEK,
            rows.iter()
                .map(|r| i64::from(r.calendar.day_of_week))
                .collect::<Vec<i64>>(),
        ),
        Series::new(
            data::IS_WEEKEND,
            rows.iter()
                .map(|r| i64::from(r.calendar.is_weekend))
                .collect::<Vec<i64>>(),
        ),
        Series::new(
            data::IS_WORKING_HOUR,
            rows.iter()
                .map(|r| i64::from(r.calendar.is_working_hour))
                .collect::<Vec<i64>>(),
        ),
        Series::new(
            data::SEASON,
            rows.iter()
                .map(|r| r.calendar.season.label())
                .collect::<Vec<&str>>(),
        ),
    ])?;

    DataLoader::from_dataframe(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generates_every_series() {
        let config = SyntheticConfig {
            server_ids: vec![1, 2],
            services: vec![ServiceCategory::CpuUsage, ServiceCategory::CpuUsageSql],
            samples_per_series: 10,
            shuffle: true,
            ..SyntheticConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let data = generate_telemetry(&config, &mut rng).unwrap();

        assert_eq!(data.len(), 40);
        assert_eq!(data.server_ids().unwrap(), vec![1, 2]);
        let samples = data.samples().unwrap();
        assert!(samples
            .iter()
            .all(|s| s.cpu_percent.map_or(false, |v| (0.0..=100.0).contains(&v))));
    }

    #[test]
    fn test_same_seed_same_data() {
        let config = SyntheticConfig {
            samples_per_series: 20,
            ..SyntheticConfig::default()
        };
        let a = generate_telemetry(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = generate_telemetry(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a.samples().unwrap(), b.samples().unwrap());
    }

    #[test]
    fn test_invalid_config() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty = SyntheticConfig {
            samples_per_series: 0,
            ..SyntheticConfig::default()
        };
        assert!(generate_telemetry(&empty, &mut rng).is_err());

        let noisy = SyntheticConfig {
            noise_std: -1.0,
            ..SyntheticConfig::default()
        };
        assert!(generate_telemetry(&noisy, &mut rng).is_err());
    }
}
