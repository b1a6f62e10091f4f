//! Closed categorical encodings used as model inputs
//!
//! Both enumerations are part of the wire contract with callers of the
//! forecasting service. New variants require retraining the model, so
//! unknown labels or codes are rejected instead of mapped to a default.

use crate::{CalendarError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monitored service whose CPU utilization is forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceCategory {
    /// Generic host CPU usage
    #[serde(rename = "CPU_Usage")]
    CpuUsage,
    /// CPU usage reported by Windows hosts
    #[serde(rename = "Windows_CPU_Usage")]
    WindowsCpuUsage,
    /// CPU usage attributed to SQL server processes
    #[serde(rename = "CPU_Usage_SQL")]
    CpuUsageSql,
}

impl ServiceCategory {
    /// All categories in code order
    pub fn all() -> [ServiceCategory; 3] {
        [
            ServiceCategory::CpuUsage,
            ServiceCategory::WindowsCpuUsage,
            ServiceCategory::CpuUsageSql,
        ]
    }

    /// Integer code fed to the model
    pub fn code(&self) -> i64 {
        match self {
            ServiceCategory::CpuUsage => 1,
            ServiceCategory::WindowsCpuUsage => 2,
            ServiceCategory::CpuUsageSql => 3,
        }
    }

    /// Human-readable label as it appears in raw telemetry
    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::CpuUsage => "CPU_Usage",
            ServiceCategory::WindowsCpuUsage => "Windows_CPU_Usage",
            ServiceCategory::CpuUsageSql => "CPU_Usage_SQL",
        }
    }

    /// Map a raw label to its category. Labels are matched exactly.
    pub fn from_label(label: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|category| category.label() == label)
            .ok_or_else(|| CalendarError::UnknownLabel {
                kind: "service",
                label: label.to_string(),
            })
    }

    /// Map an integer code to its category
    pub fn from_code(code: i64) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|category| category.code() == code)
            .ok_or(CalendarError::UnknownCode {
                kind: "service",
                code,
            })
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ServiceCategory {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}

/// Meteorological season, encoded 0..=3.
///
/// Serializes as the lowercase label; deserialization accepts any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// All seasons in code order
    pub fn all() -> [Season; 4] {
        [Season::Winter, Season::Spring, Season::Summer, Season::Autumn]
    }

    /// Integer code fed to the model
    pub fn code(&self) -> u8 {
        match self {
            Season::Winter => 0,
            Season::Spring => 1,
            Season::Summer => 2,
            Season::Autumn => 3,
        }
    }

    /// Lowercase label
    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }

    /// Map a label to its season, ignoring case and surrounding whitespace
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|season| season.label() == normalized)
            .ok_or_else(|| CalendarError::UnknownLabel {
                kind: "season",
                label: label.to_string(),
            })
    }

    /// Map an integer code to its season
    pub fn from_code(code: i64) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|season| i64::from(season.code()) == code)
            .ok_or(CalendarError::UnknownCode {
                kind: "season",
                code,
            })
    }

    /// Season of a calendar month (1 = January)
    pub fn for_month(month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidInput(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self::for_month0(month - 1))
    }

    /// Season of a zero-based month (0 = January), as chrono's `month0`
    pub(crate) fn for_month0(month0: u32) -> Self {
        MONTH_SEASONS[month0 as usize % 12]
    }
}

/// Season of each month, January first
const MONTH_SEASONS: [Season; 12] = [
    Season::Winter,
    Season::Winter,
    Season::Spring,
    Season::Spring,
    Season::Spring,
    Season::Summer,
    Season::Summer,
    Season::Summer,
    Season::Autumn,
    Season::Autumn,
    Season::Autumn,
    Season::Winter,
];

impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Season::from_label(&label).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Season {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}
