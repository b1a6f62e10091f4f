//! Prediction capability consumed by the rollout engine

use crate::error::{ForecastError, Result};
use crate::pipeline::FeatureRow;
use fleet_calendar::{CalendarFeatures, Season, ServiceCategory};
use serde::{Deserialize, Serialize};

/// Model input column names, in the order the model was trained on
pub const FEATURE_NAMES: [&str; 10] = [
    "cpu_lag_1",
    "cpu_lag_2",
    "cpu_lag_3",
    "time_gap_minutes",
    "hour",
    "day_of_week",
    "is_weekend",
    "is_working_hour",
    "season",
    "service_description",
];

/// A single row of model input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cpu_lag_1: f64,
    pub cpu_lag_2: f64,
    pub cpu_lag_3: f64,
    pub time_gap_minutes: f64,
    pub hour: i64,
    pub day_of_week: i64,
    pub is_weekend: i64,
    pub is_working_hour: i64,
    pub season: i64,
    pub service_description: i64,
}

impl FeatureVector {
    /// Assemble a vector from lag values, a time gap and calendar features
    pub fn new(
        lags: [f64; 3],
        time_gap_minutes: f64,
        calendar: &CalendarFeatures,
        service: ServiceCategory,
    ) -> Self {
        Self {
            cpu_lag_1: lags[0],
            cpu_lag_2: lags[1],
            cpu_lag_3: lags[2],
            time_gap_minutes,
            hour: i64::from(calendar.hour),
            day_of_week: i64::from(calendar.day_of_week),
            is_weekend: i64::from(calendar.is_weekend),
            is_working_hour: i64::from(calendar.is_working_hour),
            season: i64::from(calendar.season.code()),
            service_description: service.code(),
        }
    }

    /// Model input for a historical feature row, using its observed gap
    pub fn from_row(row: &FeatureRow) -> Self {
        Self {
            cpu_lag_1: f64::from(row.cpu_lag_1),
            cpu_lag_2: f64::from(row.cpu_lag_2),
            cpu_lag_3: f64::from(row.cpu_lag_3),
            time_gap_minutes: row.time_gap_minutes,
            hour: i64::from(row.hour),
            day_of_week: i64::from(row.day_of_week),
            is_weekend: i64::from(row.is_weekend),
            is_working_hour: i64::from(row.is_working_hour),
            season: i64::from(row.season.code()),
            service_description: row.service.code(),
        }
    }

    /// Values in [`FEATURE_NAMES`] order
    pub fn as_array(&self) -> [f64; 10] {
        [
            self.cpu_lag_1,
            self.cpu_lag_2,
            self.cpu_lag_3,
            self.time_gap_minutes,
            self.hour as f64,
            self.day_of_week as f64,
            self.is_weekend as f64,
            self.is_working_hour as f64,
            self.season as f64,
            self.service_description as f64,
        ]
    }

    /// Season encoded in this vector
    pub fn season(&self) -> Result<Season> {
        Ok(Season::from_code(self.season)?)
    }
}

/// Point-prediction capability: one feature vector in, one value out.
///
/// Implementations must be deterministic and hold no state between calls.
/// Any closure `Fn(&FeatureVector) -> Result<f64>` is a predictor.
pub trait Predictor {
    /// Predict CPU utilization for a single feature vector
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Predict for several independent rows
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Name of the predictor
    fn name(&self) -> &str {
        "custom predictor"
    }
}

impl<F> Predictor for F
where
    F: Fn(&FeatureVector) -> Result<f64>,
{
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self(features)
    }
}

/// Linear model over the ten input features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
    pub intercept: f64,
    /// Coefficients in [`FEATURE_NAMES`] order
    pub weights: [f64; 10],
}

impl LinearPredictor {
    /// Create a new linear predictor
    pub fn new(intercept: f64, weights: [f64; 10]) -> Result<Self> {
        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "Linear model coefficients must be finite".to_string(),
            ));
        }

        Ok(Self { intercept, weights })
    }

    /// Load coefficients from JSON: `{"intercept": .., "weights": [..]}`
    pub fn from_json(json: &str) -> Result<Self> {
        let model: LinearPredictor = serde_json::from_str(json)?;
        Self::new(model.intercept, model.weights)
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let value = features
            .as_array()
            .iter()
            .zip(self.weights.iter())
            .fold(self.intercept, |acc, (x, w)| acc + x * w);

        if !value.is_finite() {
            return Err(ForecastError::ModelError(format!(
                "Linear model produced a non-finite prediction: {}",
                value
            )));
        }
        Ok(value)
    }

    fn name(&self) -> &str {
        "Linear"
    }
}

/// Persistence baseline: the next value equals the most recent one
#[derive(Debug, Clone, Copy, Default)]
pub struct NaivePredictor;

impl Predictor for NaivePredictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        Ok(features.cpu_lag_1)
    }

    fn name(&self) -> &str {
        "Naive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use fleet_calendar::WorkingHours;

    fn sample_vector() -> FeatureVector {
        let ts = NaiveDate::from_ymd_opt(2024, 10, 16)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let calendar = CalendarFeatures::derive(ts, &WorkingHours::default());
        FeatureVector::new([45.5, 43.2, 42.8], 30.0, &calendar, ServiceCategory::CpuUsage)
    }

    #[test]
    fn test_vector_layout_matches_feature_names() {
        let vector = sample_vector();
        let values = vector.as_array();
        let json = serde_json::to_value(vector).unwrap();

        for (name, value) in FEATURE_NAMES.iter().zip(values.iter()) {
            assert_relative_eq!(json[name].as_f64().unwrap(), *value);
        }
        assert_eq!(vector.season().unwrap(), Season::Autumn);
        assert_eq!(vector.day_of_week, 2);
        assert_eq!(vector.is_working_hour, 1);
    }

    #[test]
    fn test_linear_predictor() {
        let mut weights = [0.0; 10];
        weights[0] = 0.5;
        weights[3] = 0.1;
        let model = LinearPredictor::new(1.0, weights).unwrap();

        // 1.0 + 0.5 * 45.5 + 0.1 * 30.0
        assert_relative_eq!(model.predict(&sample_vector()).unwrap(), 26.75);
        assert!(LinearPredictor::new(f64::NAN, weights).is_err());
    }

    #[test]
    fn test_linear_predictor_from_json() {
        let json = r#"{"intercept": 2.0, "weights": [1, 0, 0, 0, 0, 0, 0, 0, 0, 0]}"#;
        let model = LinearPredictor::from_json(json).unwrap();
        assert_relative_eq!(model.predict(&sample_vector()).unwrap(), 47.5);

        assert!(LinearPredictor::from_json(r#"{"intercept": 2.0, "weights": [1]}"#).is_err());
    }

    #[test]
    fn test_non_finite_prediction_is_model_error() {
        let mut weights = [0.0; 10];
        weights[0] = f64::MAX;
        let model = LinearPredictor::new(f64::MAX, weights).unwrap();
        assert!(matches!(
            model.predict(&sample_vector()),
            Err(ForecastError::ModelError(_))
        ));
    }

    #[test]
    fn test_closures_and_batches() {
        let doubled = |features: &FeatureVector| -> Result<f64> { Ok(features.cpu_lag_1 * 2.0) };
        let rows = vec![sample_vector(); 3];

        assert_eq!(doubled.predict_batch(&rows).unwrap(), vec![91.0; 3]);
        assert_eq!(NaivePredictor.predict_batch(&rows).unwrap(), vec![45.5; 3]);
        assert_eq!(doubled.name(), "custom predictor");
    }
}
