//! # Fleet Calendar
//!
//! Closed enumerations and calendar calculations shared by the feature
//! pipeline and the rollout engine.
//! This crate defines the service categories and seasons that make up the
//! model's categorical inputs, and derives the calendar features (hour,
//! day of week, weekend, working hours, season) for any point in time.

use thiserror::Error;

pub mod calendar;
pub mod category;

pub use calendar::{is_weekend_day, season_of, CalendarFeatures, WorkingHours};
pub use category::{Season, ServiceCategory};

/// Errors that can occur while encoding categories or deriving calendar features
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Unknown {kind} label: '{label}'")]
    UnknownLabel { kind: &'static str, label: String },

    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for calendar operations
pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_enumeration() {
        let err = CalendarError::UnknownLabel {
            kind: "service",
            label: "GPU_Usage".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown service label: 'GPU_Usage'");

        let err = CalendarError::UnknownCode {
            kind: "season",
            code: 7,
        };
        assert_eq!(err.to_string(), "Unknown season code: 7");
    }
}
