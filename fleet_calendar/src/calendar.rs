//! Calendar feature derivation

use crate::category::Season;
use crate::{CalendarError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Daytime window, inclusive on both ends, during which weekday samples
/// count as working hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    /// First working hour of the day
    pub start_hour: u32,
    /// Last working hour of the day
    pub end_hour: u32,
}

impl WorkingHours {
    /// Create a working-hours window
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if start_hour > 23 || end_hour > 23 {
            return Err(CalendarError::InvalidInput(format!(
                "Working hours must be within 0..=23, got {}..={}",
                start_hour, end_hour
            )));
        }
        if start_hour > end_hour {
            return Err(CalendarError::InvalidInput(format!(
                "Working hours start ({}) is after end ({})",
                start_hour, end_hour
            )));
        }

        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// Whether an hour of day falls inside the window
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
        }
    }
}

/// Weekend days are the last two positions of a Monday-first week
pub fn is_weekend_day(day_of_week: u32) -> bool {
    day_of_week >= 5
}

/// Calendar features of a single point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Hour of day, 0-23
    pub hour: u32,
    /// Day of week, Monday = 0
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub is_working_hour: bool,
    pub season: Season,
}

impl CalendarFeatures {
    /// Derive calendar features for a timestamp
    pub fn derive(timestamp: NaiveDateTime, working_hours: &WorkingHours) -> Self {
        let hour = timestamp.hour();
        let day_of_week = timestamp.weekday().num_days_from_monday();
        let is_weekend = is_weekend_day(day_of_week);

        Self {
            hour,
            day_of_week,
            is_weekend,
            is_working_hour: working_hours.contains(hour) && !is_weekend,
            season: season_of(timestamp),
        }
    }
}

/// Season of a timestamp's month
pub fn season_of(timestamp: NaiveDateTime) -> Season {
    Season::for_month0(timestamp.month0())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_july_is_summer() {
        let features = CalendarFeatures::derive(at(2024, 7, 15, 10), &WorkingHours::default());
        assert_eq!(features.season, Season::Summer);
    }

    #[test]
    fn test_evening_is_not_working_hour_on_weekday() {
        // 2024-07-17 is a Wednesday
        let features = CalendarFeatures::derive(at(2024, 7, 17, 20), &WorkingHours::default());
        assert_eq!(features.day_of_week, 2);
        assert!(!features.is_weekend);
        assert!(!features.is_working_hour);
    }

    #[rstest]
    #[case(7, false)]
    #[case(8, true)]
    #[case(12, true)]
    #[case(18, true)]
    #[case(19, false)]
    fn test_working_window_is_inclusive(#[case] hour: u32, #[case] expected: bool) {
        // Monday
        let features = CalendarFeatures::derive(at(2024, 7, 15, hour), &WorkingHours::default());
        assert_eq!(features.is_working_hour, expected);
    }

    #[test]
    fn test_weekend_is_never_working_hour() {
        // 2024-07-20 is a Saturday, 2024-07-21 a Sunday
        for day in [20, 21] {
            let features = CalendarFeatures::derive(at(2024, 7, day, 10), &WorkingHours::default());
            assert!(features.is_weekend);
            assert!(!features.is_working_hour);
        }
        assert_eq!(
            CalendarFeatures::derive(at(2024, 7, 21, 10), &WorkingHours::default()).day_of_week,
            6
        );
    }

    #[test]
    fn test_custom_working_hours() {
        let hours = WorkingHours::new(9, 17).unwrap();
        assert!(!hours.contains(8));
        assert!(hours.contains(17));
        assert!(WorkingHours::new(18, 8).is_err());
        assert!(WorkingHours::new(0, 24).is_err());
    }

    #[test]
    fn test_season_of_matches_month_mapping() {
        for month in 1..=12 {
            let timestamp = at(2023, month, 1, 0);
            assert_eq!(season_of(timestamp), Season::for_month(month).unwrap());
        }
    }
}
