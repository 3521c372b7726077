//! Weather readings
//!
//! One structured record per airport per hour. Forecast-model output and live
//! station observations share this shape and are scored identically.
//!
//! Global invariants enforced:
//! - Readings are never mutated by the engine
//! - Every field is optional; a missing field means "rule does not fire"

use serde::{Deserialize, Serialize};

/// Condition keywords that mark the free-text summary as precipitation-bearing.
const PRECIP_KEYWORDS: &[&str] = &["snow", "rain", "drizzle", "fog"];

/// Condition keywords that indicate icing on their own.
const ICING_KEYWORDS: &[&str] = &["snow", "ice", "freezing"];

/// Hourly weather at a single airport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WeatherReading {
    /// Statute miles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_miles: Option<f64>,
    /// Sustained wind, knots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed_knots: Option<f64>,
    /// Degrees true, 0-360
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust_knots: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<f64>,
    /// Inches per hour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_in: Option<f64>,
    /// Inches on the ground
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow_depth_in: Option<f64>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

impl WeatherReading {
    /// Gust if reported, otherwise sustained wind.
    pub fn effective_wind(&self) -> Option<f64> {
        self.wind_gust_knots.or(self.wind_speed_knots)
    }

    /// Precipitation intensity when it is actually falling (> 0).
    pub fn active_precipitation(&self) -> Option<f64> {
        self.precipitation_in.filter(|p| *p > 0.0)
    }

    pub fn is_freezing(&self) -> bool {
        self.temperature_f.is_some_and(|t| t < 32.0)
    }

    /// True when the condition summary names snow, rain, drizzle or fog.
    pub fn has_precip_text(&self) -> bool {
        self.conditions_contain(PRECIP_KEYWORDS)
    }

    /// True when the condition summary names snow, ice or freezing conditions.
    pub fn has_icing_text(&self) -> bool {
        self.conditions_contain(ICING_KEYWORDS)
    }

    /// Below freezing with a precipitation-bearing condition summary.
    pub fn has_freezing_precip_signal(&self) -> bool {
        self.is_freezing() && self.has_precip_text()
    }

    fn conditions_contain(&self, keywords: &[&str]) -> bool {
        match &self.conditions {
            Some(text) => {
                let lower = text.to_ascii_lowercase();
                keywords.iter().any(|k| lower.contains(k))
            }
            None => false,
        }
    }
}

/// Weather context for one flight: the local airport plus, optionally, the
/// other end of the flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AirportWeather {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<WeatherReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<WeatherReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<WeatherReading>,
}

impl AirportWeather {
    /// Local-only context (single-airport path)
    pub fn local(reading: WeatherReading) -> Self {
        AirportWeather {
            local: Some(reading),
            origin: None,
            destination: None,
        }
    }

    /// Whether any non-local reading was captured
    pub fn is_multi_airport(&self) -> bool {
        self.origin.is_some() || self.destination.is_some()
    }
}
