//! Autoregressive multi-step rollout
//!
//! Starting from the latest feature row of one (server, service) group,
//! the engine predicts one step, feeds the prediction back as the newest
//! lag and advances a simulated clock by the cadence. After `LAG_DEPTH`
//! steps every lag is itself a model output, so errors compound with the
//! step index; see [`crate::metrics::error_growth`] for measuring that.

use crate::error::{ForecastError, Result};
use crate::models::{FeatureVector, Predictor};
use crate::pipeline::{FeatureRow, FeatureTable, ForecastTarget, LAG_DEPTH};
use crate::utils::floor_to_minute;
use chrono::{Duration, Local, NaiveDateTime};
use fleet_calendar::{CalendarFeatures, ServiceCategory, WorkingHours};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Longest accepted cadence: one year of minutes
pub const MAX_CADENCE_MINUTES: i64 = 366 * 24 * 60;

/// What to do when the predictor fails mid-rollout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole rollout; no partial results
    #[default]
    Abort,
    /// Return the points emitted before the failing step. A failure at
    /// the first step is still an error, so a rollout never succeeds empty.
    Truncate,
}

/// Rollout configuration supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Number of predictions to emit
    pub steps: usize,
    /// Simulated time between consecutive predictions
    pub cadence_minutes: i64,
    /// Time gap fed to the model at every step, in place of the historical gap
    pub time_gap_minutes: f64,
    pub working_hours: WorkingHours,
    pub failure_policy: FailurePolicy,
}

impl Default for RolloutConfig {
    /// 14 days of 30-minute predictions
    fn default() -> Self {
        Self {
            steps: 14 * 48,
            cadence_minutes: 30,
            time_gap_minutes: 30.0,
            working_hours: WorkingHours::default(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl RolloutConfig {
    /// Create a configuration whose model time gap equals the cadence
    pub fn new(steps: usize, cadence_minutes: i64) -> Result<Self> {
        let config = Self {
            steps,
            cadence_minutes,
            time_gap_minutes: cadence_minutes as f64,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the time gap fed to the model
    pub fn with_time_gap(mut self, time_gap_minutes: f64) -> Self {
        self.time_gap_minutes = time_gap_minutes;
        self
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = working_hours;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RolloutConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot drive a rollout
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "Rollout steps must be positive".to_string(),
            ));
        }
        if self.cadence_minutes <= 0 || self.cadence_minutes > MAX_CADENCE_MINUTES {
            return Err(ForecastError::InvalidParameter(format!(
                "Cadence must be between 1 and {} minutes, got {}",
                MAX_CADENCE_MINUTES, self.cadence_minutes
            )));
        }
        if !self.time_gap_minutes.is_finite() || self.time_gap_minutes <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Time gap must be a positive number of minutes, got {}",
                self.time_gap_minutes
            )));
        }
        WorkingHours::new(self.working_hours.start_hour, self.working_hours.end_hour)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        Ok(())
    }

    /// Cadence as a duration; only meaningful on a validated configuration
    pub fn cadence(&self) -> Duration {
        Duration::minutes(self.cadence_minutes)
    }
}

/// One emitted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "Timestamp")]
    pub timestamp: NaiveDateTime,
    pub server_id: i64,
    #[serde(rename = "service_description")]
    pub service: ServiceCategory,
    #[serde(rename = "predicted_CPU_percent")]
    pub predicted_cpu_percent: f64,
}

/// Recursive state of a single rollout, owned by that call
#[derive(Debug, Clone)]
struct RolloutState {
    target: ForecastTarget,
    /// Most recent first
    lags: [f64; LAG_DEPTH],
    /// Gap of the seed row; kept for diagnostics, never fed to the model
    seed_gap_minutes: f64,
    clock: NaiveDateTime,
}

impl RolloutState {
    fn seed(row: &FeatureRow, anchor: NaiveDateTime) -> Self {
        Self {
            target: ForecastTarget::new(row.server_id, row.service),
            lags: [
                f64::from(row.cpu_lag_1),
                f64::from(row.cpu_lag_2),
                f64::from(row.cpu_lag_3),
            ],
            seed_gap_minutes: row.time_gap_minutes,
            clock: floor_to_minute(anchor),
        }
    }

    /// Shift the lag window and make the prediction the newest lag
    fn push_prediction(&mut self, predicted: f64) {
        self.lags.rotate_right(1);
        self.lags[0] = predicted;
    }

    fn advance(&mut self, cadence: Duration) -> Result<()> {
        self.clock = self.clock.checked_add_signed(cadence).ok_or_else(|| {
            ForecastError::InvalidParameter(format!(
                "Simulated clock overflowed after {}",
                self.clock
            ))
        })?;
        Ok(())
    }
}

/// Runs rollouts against an injected predictor
#[derive(Debug)]
pub struct RolloutEngine<'a, P: Predictor + ?Sized> {
    predictor: &'a P,
    config: RolloutConfig,
}

impl<'a, P: Predictor + ?Sized> RolloutEngine<'a, P> {
    /// Create an engine, validating the configuration
    pub fn new(predictor: &'a P, config: RolloutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { predictor, config })
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Forecast one target starting from the current wall-clock minute
    pub fn forecast(
        &self,
        table: &FeatureTable,
        server_id: i64,
        service: ServiceCategory,
    ) -> Result<Vec<ForecastPoint>> {
        self.forecast_at(table, server_id, service, Local::now().naive_local())
    }

    /// Forecast one target with the simulated clock anchored at `now`,
    /// floored to the minute
    pub fn forecast_at(
        &self,
        table: &FeatureTable,
        server_id: i64,
        service: ServiceCategory,
        now: NaiveDateTime,
    ) -> Result<Vec<ForecastPoint>> {
        let seed = table
            .latest(server_id, service)
            .ok_or(ForecastError::InsufficientHistory { server_id, service })?;

        let mut state = RolloutState::seed(seed, now);
        debug!(
            "Seeding rollout for server {} with service {} from row at {} (gap {:.1} min), anchored at {}",
            server_id, service, seed.timestamp, state.seed_gap_minutes, state.clock
        );

        let cadence = self.config.cadence();
        let mut points = Vec::with_capacity(self.config.steps);

        for step in 0..self.config.steps {
            let calendar = CalendarFeatures::derive(state.clock, &self.config.working_hours);
            let features = FeatureVector::new(
                state.lags,
                self.config.time_gap_minutes,
                &calendar,
                state.target.service,
            );

            let predicted = match self.predictor.predict(&features) {
                Ok(value) => value,
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Truncate if !points.is_empty() => {
                        warn!(
                            "Prediction failed for server {} with service {} at step {}, returning {} points: {}",
                            server_id, service, step, points.len(), err
                        );
                        break;
                    }
                    _ => {
                        return Err(ForecastError::Prediction {
                            server_id,
                            service,
                            step,
                            source: Box::new(err),
                        })
                    }
                },
            };

            points.push(ForecastPoint {
                timestamp: state.clock,
                server_id,
                service,
                predicted_cpu_percent: predicted,
            });

            state.push_prediction(predicted);
            state.advance(cadence)?;
        }

        info!(
            "Forecast {} points for server {} with service {} using {}",
            points.len(),
            server_id,
            service,
            self.predictor.name()
        );
        Ok(points)
    }
}

impl<'a, P: Predictor + Sync + ?Sized> RolloutEngine<'a, P> {
    /// Forecast several targets in parallel from a shared anchor time.
    ///
    /// Results are returned in the order of `targets`; one target failing
    /// does not affect the others.
    pub fn forecast_many(
        &self,
        table: &FeatureTable,
        targets: &[ForecastTarget],
    ) -> Vec<Result<Vec<ForecastPoint>>> {
        self.forecast_many_at(table, targets, Local::now().naive_local())
    }

    /// [`RolloutEngine::forecast_many`] with an explicit anchor time
    pub fn forecast_many_at(
        &self,
        table: &FeatureTable,
        targets: &[ForecastTarget],
        now: NaiveDateTime,
    ) -> Vec<Result<Vec<ForecastPoint>>> {
        targets
            .par_iter()
            .map(|target| self.forecast_at(table, target.server_id, target.service, now))
            .collect()
    }
}
