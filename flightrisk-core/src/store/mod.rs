//! Outcome history: the analog/calibration contract and its record types

pub mod sqlite;

use crate::analogs::{AnalogCounts, AnalogFilter};
use crate::calibration::CalibrationSample;
use crate::flight::FlightType;
use crate::weather::WeatherReading;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use sqlite::SqliteOutcomeStore;

/// Read side the engine needs from past outcomes
///
/// Implementations must be safe to share across scoring threads.
pub trait OutcomeStore: Send + Sync {
    /// `(total, cancelled)` over stored flights matching every clause
    fn find_analogs(&self, filter: &AnalogFilter) -> Result<AnalogCounts>;

    /// Logged predictions joined against recorded outcomes
    fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>>;
}

impl<T: OutcomeStore + ?Sized> OutcomeStore for &T {
    fn find_analogs(&self, filter: &AnalogFilter) -> Result<AnalogCounts> {
        (**self).find_analogs(filter)
    }

    fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>> {
        (**self).calibration_inputs()
    }
}

impl<T: OutcomeStore + ?Sized> OutcomeStore for Arc<T> {
    fn find_analogs(&self, filter: &AnalogFilter) -> Result<AnalogCounts> {
        (**self).find_analogs(filter)
    }

    fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>> {
        (**self).calibration_inputs()
    }
}

/// One past flight with its outcome and the weather at each end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalFlight {
    pub flight_number: String,
    /// Local calendar date, `YYYY-MM-DD`
    pub flight_date: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub flight_type: Option<FlightType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub is_cancelled: bool,
    #[serde(default)]
    pub local_weather: WeatherReading,
    #[serde(default)]
    pub origin_weather: WeatherReading,
    #[serde(default)]
    pub destination_weather: WeatherReading,
}

/// Outcome totals over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentStats {
    pub days: u32,
    pub total: u64,
    pub cancelled: u64,
    /// Percent; 0 when there are no flights
    pub cancellation_rate: f64,
}

/// Outcome totals for one `YYYY-MM`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub month: String,
    pub total: u64,
    pub cancelled: u64,
    pub cancellation_rate: f64,
    pub avg_visibility: Option<f64>,
    pub avg_wind: Option<f64>,
    pub avg_temp: Option<f64>,
}

/// Extent of the stored history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRange {
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub total: u64,
    /// Inclusive day count between first and last date
    pub days_covered: i64,
}

/// Percentage helper shared by the statistics queries
pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
