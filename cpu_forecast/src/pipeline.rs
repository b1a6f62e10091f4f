//! Feature pipeline: raw telemetry to model-ready feature rows
//!
//! The pipeline sorts samples by (server, service, timestamp), computes the
//! time gap to the previous sample of the same (server, service) group and
//! the three previous observed values of the same server, then drops every
//! row that lacks any of them. Nothing is imputed.

use crate::data::{self, RawSample, SeasonInput, TelemetryData};
use crate::error::{ForecastError, Result};
use crate::models::FeatureVector;
use chrono::NaiveDateTime;
use fleet_calendar::{season_of, Season, ServiceCategory};
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of previous observations fed to the model
pub const LAG_DEPTH: usize = 3;

/// A sample augmented with lag, gap and season features.
///
/// Every field is present; rows that could not be completed are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub server_id: i64,
    pub service_id: Option<i64>,
    pub service: ServiceCategory,
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f32,
    pub hour: i8,
    pub day_of_week: i8,
    pub is_weekend: i8,
    pub is_working_hour: i8,
    pub season: Season,
    /// Minutes since the previous sample of the same (server, service) group
    pub time_gap_minutes: f64,
    pub cpu_lag_1: f32,
    pub cpu_lag_2: f32,
    pub cpu_lag_3: f32,
}

/// A (server, service) pair to forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForecastTarget {
    pub server_id: i64,
    pub service: ServiceCategory,
}

impl ForecastTarget {
    pub fn new(server_id: i64, service: ServiceCategory) -> Self {
        Self { server_id, service }
    }
}

/// Feature rows sorted by (server, service code, timestamp)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// All rows in sort order
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one (server, service) group, oldest first
    pub fn group(
        &self,
        server_id: i64,
        service: ServiceCategory,
    ) -> impl Iterator<Item = &FeatureRow> + '_ {
        self.rows
            .iter()
            .filter(move |row| row.server_id == server_id && row.service == service)
    }

    /// Time-latest row of one (server, service) group
    pub fn latest(&self, server_id: i64, service: ServiceCategory) -> Option<&FeatureRow> {
        self.group(server_id, service).max_by_key(|row| row.timestamp)
    }

    /// Distinct (server, service) pairs in sort order
    pub fn targets(&self) -> Vec<ForecastTarget> {
        let mut targets: Vec<ForecastTarget> = self
            .rows
            .iter()
            .map(|row| ForecastTarget::new(row.server_id, row.service))
            .collect();
        targets.dedup();
        targets
    }

    /// Model inputs for every row, using each row's observed gap
    pub fn feature_vectors(&self) -> Vec<FeatureVector> {
        self.rows.iter().map(FeatureVector::from_row).collect()
    }

    /// Export the table as a DataFrame with the model's column names
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = &self.rows;
        let df = DataFrame::new(vec![
            Series::new(
                data::SERVER_ID,
                rows.iter().map(|r| r.server_id).collect::<Vec<i64>>(),
            ),
            Series::new(
                data::SERVICE_ID,
                rows.iter().map(|r| r.service_id).collect::<Vec<Option<i64>>>(),
            ),
            Series::new(
                data::SERVICE_DESCRIPTION,
                rows.iter().map(|r| r.service.code()).collect::<Vec<i64>>(),
            ),
            Series::new(
                data::TIMESTAMP,
                rows.iter()
                    .map(|r| r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                    .collect::<Vec<String>>(),
            ),
            Series::new(
                data::CPU_PERCENT,
                rows.iter().map(|r| r.cpu_percent).collect::<Vec<f32>>(),
            ),
            Series::new(
                data::HOUR,
                rows.iter().map(|r| i32::from(r.hour)).collect::<Vec<i32>>(),
            ),
            Series::new(
                data::DAY_OF_WEEK,
                rows.iter()
                    .map(|r| i32::from(r.day_of_week))
                    .collect::<Vec<i32>>(),
            ),
            Series::new(
                data::IS_WEEKEND,
                rows.iter()
                    .map(|r| i32::from(r.is_weekend))
                    .collect::<Vec<i32>>(),
            ),
            Series::new(
                data::IS_WORKING_HOUR,
                rows.iter()
                    .map(|r| i32::from(r.is_working_hour))
                    .collect::<Vec<i32>>(),
            ),
            Series::new(
                data::SEASON,
                rows.iter()
                    .map(|r| i32::from(r.season.code()))
                    .collect::<Vec<i32>>(),
            ),
            Series::new(
                "time_gap_minutes",
                rows.iter().map(|r| r.time_gap_minutes).collect::<Vec<f64>>(),
            ),
            Series::new(
                "cpu_lag_1",
                rows.iter().map(|r| r.cpu_lag_1).collect::<Vec<f32>>(),
            ),
            Series::new(
                "cpu_lag_2",
                rows.iter().map(|r| r.cpu_lag_2).collect::<Vec<f32>>(),
            ),
            Series::new(
                "cpu_lag_3",
                rows.iter().map(|r| r.cpu_lag_3).collect::<Vec<f32>>(),
            ),
        ])?;

        Ok(df)
    }
}

/// Stateless batch transform from raw telemetry to a [`FeatureTable`]
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    strict_group_history: bool,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self {
            strict_group_history: true,
        }
    }
}

/// Sample with a parsed timestamp, plus its derived features
struct Candidate {
    sample: RawSample,
    timestamp: NaiveDateTime,
    gap: Option<f64>,
    lags: [Option<f32>; LAG_DEPTH],
    group_position: usize,
}

impl FeaturePipeline {
    /// Create a pipeline with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true` (the default), a row is only kept once its own
    /// (server, service) group has `LAG_DEPTH` earlier samples, so groups
    /// with fewer than four samples never produce rows. When `false`, rows
    /// near the start of a group may use lags from the same server's
    /// previous service group.
    pub fn with_strict_group_history(mut self, strict: bool) -> Self {
        self.strict_group_history = strict;
        self
    }

    /// Run the pipeline over a telemetry table
    pub fn transform(&self, data: &TelemetryData) -> Result<FeatureTable> {
        let samples = data.samples()?;
        self.transform_samples(samples)
    }

    /// Run the pipeline over already coerced samples
    pub fn transform_samples(&self, samples: Vec<RawSample>) -> Result<FeatureTable> {
        let input_rows = samples.len();

        let mut untimed = 0usize;
        let mut timed: Vec<(NaiveDateTime, RawSample)> = samples
            .into_iter()
            .filter_map(|sample| match sample.timestamp {
                Some(timestamp) => Some((timestamp, sample)),
                None => {
                    untimed += 1;
                    None
                }
            })
            .collect();
        if untimed > 0 {
            warn!(
                "Dropping {} of {} samples with missing or unparseable timestamps",
                untimed, input_rows
            );
        }

        // Stable sort; every gap and lag below depends on this order
        timed.sort_by(|(ts_a, a), (ts_b, b)| {
            (a.server_id, a.service.code(), ts_a).cmp(&(b.server_id, b.service.code(), ts_b))
        });

        let candidates = derive_features(timed);
        let mut kept_per_group: BTreeMap<ForecastTarget, usize> = BTreeMap::new();
        let mut complete = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let target = ForecastTarget::new(candidate.sample.server_id, candidate.sample.service);
            let kept = kept_per_group.entry(target).or_insert(0);

            if self.strict_group_history && candidate.group_position < LAG_DEPTH {
                continue;
            }
            if let Some(row) = complete_row(candidate) {
                *kept += 1;
                complete.push(row);
            }
        }

        for (target, kept) in &kept_per_group {
            if *kept == 0 {
                debug!(
                    "Server {} with service {} has too little history and yields no rows",
                    target.server_id, target.service
                );
            }
        }

        // Season is normalized only for rows that survived the filter
        let rows = complete
            .into_iter()
            .map(|(row, season)| finish_row(row, season))
            .collect::<Result<Vec<FeatureRow>>>()?;

        info!(
            "Feature pipeline kept {} of {} rows across {} groups",
            rows.len(),
            input_rows,
            kept_per_group.len()
        );

        Ok(FeatureTable { rows })
    }
}

/// Gap per (server, service) group and lags per server, over sorted samples
fn derive_features(timed: Vec<(NaiveDateTime, RawSample)>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::with_capacity(timed.len());

    for (timestamp, sample) in timed {
        let same_group = |prev: &Candidate| {
            prev.sample.server_id == sample.server_id && prev.sample.service == sample.service
        };

        let (gap, group_position) = match candidates.last() {
            Some(prev) if same_group(prev) => {
                let elapsed = timestamp.signed_duration_since(prev.timestamp);
                (
                    Some(elapsed.num_milliseconds() as f64 / 60_000.0),
                    prev.group_position + 1,
                )
            }
            _ => (None, 0),
        };

        let mut lags = [None; LAG_DEPTH];
        for (offset, lag) in lags.iter_mut().enumerate() {
            let back = offset + 1;
            if candidates.len() >= back {
                let prev = &candidates[candidates.len() - back];
                if prev.sample.server_id == sample.server_id {
                    *lag = prev.sample.cpu_percent;
                }
            }
        }

        candidates.push(Candidate {
            sample,
            timestamp,
            gap,
            lags,
            group_position,
        });
    }

    candidates
}

/// Build a row if every mandatory field is present; the season is returned
/// alongside for normalization after filtering
fn complete_row(candidate: Candidate) -> Option<(FeatureRow, Option<SeasonInput>)> {
    let Candidate {
        sample,
        timestamp,
        gap,
        lags,
        ..
    } = candidate;

    let cpu_percent = sample.cpu_percent?;
    let time_gap_minutes = gap?;
    let [lag_1, lag_2, lag_3] = lags;

    let row = FeatureRow {
        server_id: sample.server_id,
        service_id: sample.service_id,
        service: sample.service,
        timestamp,
        cpu_percent,
        hour: sample.hour,
        day_of_week: sample.day_of_week,
        is_weekend: sample.is_weekend,
        is_working_hour: sample.is_working_hour,
        // placeholder until normalization
        season: Season::Winter,
        time_gap_minutes,
        cpu_lag_1: lag_1?,
        cpu_lag_2: lag_2?,
        cpu_lag_3: lag_3?,
    };

    Some((row, sample.season))
}

fn finish_row(mut row: FeatureRow, season: Option<SeasonInput>) -> Result<FeatureRow> {
    row.season = match season {
        Some(SeasonInput::Label(label)) => Season::from_label(&label),
        Some(SeasonInput::Code(code)) => Season::from_code(code),
        None => Ok(season_of(row.timestamp)),
    }
    .map_err(|e| {
        ForecastError::SchemaError(format!(
            "{} for server {} at {}",
            e, row.server_id, row.timestamp
        ))
    })?;

    Ok(row)
}
