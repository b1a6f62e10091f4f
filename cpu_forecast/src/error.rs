//! Error types for the cpu_forecast crate

use fleet_calendar::{CalendarError, ServiceCategory};
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the cpu_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Required column missing, impossible type coercion or unmapped label
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// No usable feature rows for the requested target
    #[error("No historical data for server {server_id} with service {service}")]
    InsufficientHistory {
        server_id: i64,
        service: ServiceCategory,
    },

    /// The prediction capability failed during a rollout
    #[error("Prediction failed for server {server_id} with service {service} at step {step}: {source}")]
    Prediction {
        server_id: i64,
        service: ServiceCategory,
        step: usize,
        #[source]
        source: Box<ForecastError>,
    },

    /// Error raised by a prediction model
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to parameter or input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from CSV or JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification a serving layer can map to distinct responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller must fix the input
    Schema,
    /// Expected in production: no forecast is available for the target
    InsufficientHistory,
    /// The model failed mid-rollout
    Prediction,
    Other,
}

impl ForecastError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::SchemaError(_) => ErrorKind::Schema,
            ForecastError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            ForecastError::Prediction { .. } | ForecastError::ModelError(_) => ErrorKind::Prediction,
            _ => ErrorKind::Other,
        }
    }

    /// Whether this error means "no forecast available" rather than a fault
    pub fn is_insufficient_history(&self) -> bool {
        self.kind() == ErrorKind::InsufficientHistory
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<CalendarError> for ForecastError {
    fn from(err: CalendarError) -> Self {
        ForecastError::SchemaError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
