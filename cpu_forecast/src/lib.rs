//! # CPU Forecast
//!
//! Multi-step-ahead CPU utilization forecasting for a fleet of monitored servers.
//!
//! ## Features
//!
//! - Telemetry loading from CSV files or Polars DataFrames
//! - A feature pipeline deriving lag, time-gap and season features per server and service
//! - An autoregressive rollout engine driving any point-prediction model
//! - Parallel rollouts across independent (server, service) targets
//! - Accuracy and error-growth metrics for backtesting rollouts
//!
//! ## Quick Start
//!
//! ```no_run
//! use cpu_forecast::data::DataLoader;
//! use cpu_forecast::models::NaivePredictor;
//! use cpu_forecast::pipeline::FeaturePipeline;
//! use cpu_forecast::rollout::{RolloutConfig, RolloutEngine};
//! use fleet_calendar::ServiceCategory;
//!
//! # fn main() -> cpu_forecast::Result<()> {
//! // Load raw telemetry and derive features
//! let data = DataLoader::from_csv("data.csv")?;
//! let table = FeaturePipeline::new().transform(&data)?;
//!
//! // 14 days of 30-minute predictions
//! let predictor = NaivePredictor;
//! let engine = RolloutEngine::new(&predictor, RolloutConfig::default())?;
//! let forecast = engine.forecast(&table, 638939, ServiceCategory::CpuUsage)?;
//! assert_eq!(forecast.len(), 672);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod rollout;
pub mod synthetic;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, RawSample, TelemetryData};
pub use crate::error::{ErrorKind, ForecastError, Result};
pub use crate::models::{FeatureVector, LinearPredictor, NaivePredictor, Predictor};
pub use crate::pipeline::{FeaturePipeline, FeatureRow, FeatureTable, ForecastTarget};
pub use crate::rollout::{FailurePolicy, ForecastPoint, RolloutConfig, RolloutEngine};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
