//! # CPU Forecast Workspace
//!
//! One-call fleet forecasting on top of [`cpu_forecast`] and [`fleet_calendar`].
//!
//! [`FleetForecaster`] bundles a predictor, a feature pipeline and a rollout
//! configuration, and accepts service categories by their wire labels.
//!
//! ## Example
//!
//! ```no_run
//! use cpu_forecast_workspace::cpu_forecast::{DataLoader, NaivePredictor};
//! use cpu_forecast_workspace::FleetForecaster;
//!
//! # fn main() -> cpu_forecast_workspace::cpu_forecast::Result<()> {
//! let data = DataLoader::from_csv("telemetry.csv")?;
//! let forecaster = FleetForecaster::new(NaivePredictor);
//! let points = forecaster.forecast(&data, 638939, "CPU_Usage")?;
//! assert_eq!(points.len(), 672);
//! # Ok(())
//! # }
//! ```

pub use cpu_forecast;
pub use fleet_calendar;

use chrono::{Local, NaiveDateTime};
use cpu_forecast::{
    FeaturePipeline, ForecastPoint, ForecastTarget, Predictor, Result, RolloutConfig,
    RolloutEngine, TelemetryData,
};
use fleet_calendar::ServiceCategory;
use log::info;

/// Forecast for one target, as returned by [`FleetForecaster::forecast_fleet`]
pub type TargetForecast = (ForecastTarget, Result<Vec<ForecastPoint>>);

/// A predictor plus the settings needed to go from raw telemetry to forecasts
#[derive(Debug, Clone)]
pub struct FleetForecaster<P> {
    predictor: P,
    pipeline: FeaturePipeline,
    config: RolloutConfig,
}

impl<P: Predictor> FleetForecaster<P> {
    /// Creates a forecaster with the default pipeline and a 14-day, 30-minute rollout.
    ///
    /// # Examples
    ///
    /// ```
    /// use cpu_forecast_workspace::cpu_forecast::NaivePredictor;
    /// use cpu_forecast_workspace::FleetForecaster;
    ///
    /// let forecaster = FleetForecaster::new(NaivePredictor);
    /// assert_eq!(forecaster.config().steps, 672);
    /// ```
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            pipeline: FeaturePipeline::default(),
            config: RolloutConfig::default(),
        }
    }

    /// Replaces the rollout configuration after validating it.
    ///
    /// # Examples
    ///
    /// ```
    /// use cpu_forecast_workspace::cpu_forecast::{NaivePredictor, RolloutConfig};
    /// use cpu_forecast_workspace::FleetForecaster;
    ///
    /// let config = RolloutConfig::new(48, 30).unwrap();
    /// let forecaster = FleetForecaster::new(NaivePredictor).with_config(config).unwrap();
    /// assert_eq!(forecaster.config().steps, 48);
    ///
    /// let mut broken = RolloutConfig::default();
    /// broken.cadence_minutes = 0;
    /// assert!(FleetForecaster::new(NaivePredictor).with_config(broken).is_err());
    /// ```
    pub fn with_config(mut self, config: RolloutConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_pipeline(mut self, pipeline: FeaturePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Forecasts one server and service label from the current minute
    pub fn forecast(
        &self,
        data: &TelemetryData,
        server_id: i64,
        service_label: &str,
    ) -> Result<Vec<ForecastPoint>> {
        self.forecast_at(data, server_id, service_label, Local::now().naive_local())
    }

    /// Like [`FleetForecaster::forecast`] with an explicit anchor time.
    ///
    /// An unknown service label is a schema error.
    pub fn forecast_at(
        &self,
        data: &TelemetryData,
        server_id: i64,
        service_label: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<ForecastPoint>> {
        let service: ServiceCategory = service_label.parse()?;
        let table = self.pipeline.transform(data)?;
        let engine = RolloutEngine::new(&self.predictor, self.config.clone())?;
        engine.forecast_at(&table, server_id, service, now)
    }
}

impl<P: Predictor + Sync> FleetForecaster<P> {
    /// Forecasts every target with usable history, in parallel
    pub fn forecast_fleet(&self, data: &TelemetryData) -> Result<Vec<TargetForecast>> {
        self.forecast_fleet_at(data, Local::now().naive_local())
    }

    /// Like [`FleetForecaster::forecast_fleet`] with an explicit anchor time
    pub fn forecast_fleet_at(
        &self,
        data: &TelemetryData,
        now: NaiveDateTime,
    ) -> Result<Vec<TargetForecast>> {
        let table = self.pipeline.transform(data)?;
        let targets = table.targets();
        info!("Forecasting {} targets", targets.len());

        let engine = RolloutEngine::new(&self.predictor, self.config.clone())?;
        let results = engine.forecast_many_at(&table, &targets, now);
        Ok(targets.into_iter().zip(results).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cpu_forecast::synthetic::{generate_telemetry, SyntheticConfig};
    use cpu_forecast::{ErrorKind, NaivePredictor};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn telemetry() -> TelemetryData {
        let config = SyntheticConfig {
            server_ids: vec![5, 9],
            services: vec![ServiceCategory::CpuUsage, ServiceCategory::CpuUsageSql],
            samples_per_series: 12,
            ..SyntheticConfig::default()
        };
        generate_telemetry(&config, &mut StdRng::seed_from_u64(3)).unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn forecaster() -> FleetForecaster<NaivePredictor> {
        FleetForecaster::new(NaivePredictor)
            .with_config(RolloutConfig::new(8, 30).unwrap())
            .unwrap()
    }

    #[test]
    fn test_forecast_by_label() {
        let points = forecaster()
            .forecast_at(&telemetry(), 9, "CPU_Usage_SQL", noon())
            .unwrap();
        assert_eq!(points.len(), 8);
        assert!(points
            .iter()
            .all(|p| p.server_id == 9 && p.service == ServiceCategory::CpuUsageSql));
    }

    #[test]
    fn test_unknown_label_is_schema_error() {
        let err = forecaster()
            .forecast_at(&telemetry(), 9, "Disk_Usage", noon())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_unknown_server_has_no_history() {
        let err = forecaster()
            .forecast_at(&telemetry(), 404, "CPU_Usage", noon())
            .unwrap_err();
        assert!(err.is_insufficient_history());
    }

    #[test]
    fn test_forecast_fleet() {
        let results = forecaster().forecast_fleet_at(&telemetry(), noon()).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].0, ForecastTarget::new(5, ServiceCategory::CpuUsage));
        for (target, result) in results {
            let points = result.unwrap();
            assert_eq!(points.len(), 8);
            assert_eq!(points[0].server_id, target.server_id);
        }
    }
}
