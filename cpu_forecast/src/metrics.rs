//! Metrics for evaluating rollout accuracy against observed values

use crate::error::{ForecastError, Result};
use crate::rollout::ForecastPoint;
use statrs::statistics::Statistics;

/// Accuracy of predicted CPU percentages against observed ones.
///
/// Errors are in percentage points. Percentage errors are relative to the
/// observed value, so idle (0%) samples are left out of MAPE entirely
/// rather than counted as perfect.
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    check_lengths(forecast, actual)?;

    let absolute: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (a - f).abs())
        .collect();

    let mae = absolute.iter().mean();
    let mse = absolute.iter().map(|e| e * e).mean();

    let relative: Vec<f64> = absolute
        .iter()
        .zip(actual)
        .filter(|(_, a)| **a != 0.0)
        .map(|(e, a)| 100.0 * e / a.abs())
        .collect();
    let mape = if relative.is_empty() {
        None
    } else {
        Some(relative.iter().mean())
    };

    // both sides idle counts as an exact hit
    let smape = absolute
        .iter()
        .zip(forecast.iter().zip(actual))
        .map(|(e, (f, a))| {
            let scale = f.abs() + a.abs();
            if scale == 0.0 {
                0.0
            } else {
                200.0 * e / scale
            }
        })
        .mean();

    Ok(ForecastAccuracy {
        mae,
        rmse: mse.sqrt(),
        mse,
        mape,
        smape,
    })
}

fn check_lengths(forecast: &[f64], actual: &[f64]) -> Result<()> {
    if forecast.is_empty() || forecast.len() != actual.len() {
        return Err(ForecastError::ValidationError(format!(
            "Forecast and observed series must be non-empty and equally long, got {} and {}",
            forecast.len(),
            actual.len()
        )));
    }
    Ok(())
}

/// Mean absolute error over consecutive windows of `window` steps.
///
/// A rising sequence shows error compounding through the rollout. The last
/// window may be shorter than `window`.
pub fn error_growth(forecast: &[f64], actual: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(ForecastError::InvalidParameter(
            "Window size must be positive".to_string(),
        ));
    }
    check_lengths(forecast, actual)?;

    let absolute_errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| (a - f).abs())
        .collect();

    Ok(absolute_errors
        .chunks(window)
        .map(|chunk| chunk.iter().mean())
        .collect())
}

/// Accuracy of a whole rollout plus its per-window error growth
pub fn evaluate_rollout(
    points: &[ForecastPoint],
    actual: &[f64],
    window: usize,
) -> Result<RolloutEvaluation> {
    let forecast: Vec<f64> = points.iter().map(|p| p.predicted_cpu_percent).collect();

    Ok(RolloutEvaluation {
        accuracy: forecast_accuracy(&forecast, actual)?,
        error_growth: error_growth(&forecast, actual, window)?,
    })
}

/// Whole-rollout accuracy, in CPU percentage points unless noted
#[derive(Debug, Clone)]
pub struct ForecastAccuracy {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Mean absolute percentage error over non-idle observations;
    /// `None` when every observation is 0%
    pub mape: Option<f64>,
    /// Symmetric MAPE, in percent
    pub smape: f64,
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rollout accuracy:")?;
        writeln!(f, "  MAE:   {:.4} pp", self.mae)?;
        writeln!(f, "  RMSE:  {:.4} pp", self.rmse)?;
        match self.mape {
            Some(mape) => writeln!(f, "  MAPE:  {:.2}%", mape)?,
            None => writeln!(f, "  MAPE:  n/a (all observations idle)")?,
        }
        writeln!(f, "  SMAPE: {:.2}%", self.smape)
    }
}

/// Result of [`evaluate_rollout`]
#[derive(Debug, Clone)]
pub struct RolloutEvaluation {
    pub accuracy: ForecastAccuracy,
    /// Mean absolute error per window of steps
    pub error_growth: Vec<f64>,
}

impl RolloutEvaluation {
    /// Ratio of the last window's error to the first window's
    pub fn drift_ratio(&self) -> Option<f64> {
        let first = *self.error_growth.first()?;
        let last = *self.error_growth.last()?;
        if first == 0.0 {
            None
        } else {
            Some(last / first)
        }
    }
}

impl std::fmt::Display for RolloutEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.accuracy)?;
        writeln!(f, "Error growth (MAE per window):")?;
        for (i, mae) in self.error_growth.iter().enumerate() {
            writeln!(f, "  window {:>3}: {:.4}", i, mae)?;
        }
        Ok(())
    }
}
