//! Flight metadata supplied by the caller

use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};

/// Direction of the operation as seen from the local airport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightType {
    Arrival,
    Departure,
}

impl FlightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightType::Arrival => "arrival",
            FlightType::Departure => "departure",
        }
    }

    /// The operation the same flight performs at the other airport.
    pub fn opposite(&self) -> FlightType {
        match self {
            FlightType::Arrival => FlightType::Departure,
            FlightType::Departure => FlightType::Arrival,
        }
    }
}

/// Read-only description of the flight being scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlightContext {
    pub id: String,
    /// Marketing flight number (e.g. "AS2156"); used to join predictions with outcomes
    #[serde(default)]
    pub number: Option<String>,
    /// RFC 3339 timestamp with explicit offset. Kept as text so that an
    /// unparseable value disables the seasonal baseline instead of the whole call.
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(rename = "type")]
    pub flight_type: FlightType,
    pub origin: String,
    pub destination: String,
}

impl FlightContext {
    /// Parse the scheduled time, accepting a trailing `Z`.
    pub fn scheduled_at(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.scheduled_time.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw).ok()
    }

    /// Calendar month (1-12) in the timestamp's own offset
    pub fn scheduled_month(&self) -> Option<u32> {
        self.scheduled_at().map(|dt| dt.month())
    }

    /// `YYYY-MM-DD` of the scheduled time, used as the outcome join key
    pub fn scheduled_date(&self) -> Option<String> {
        self.scheduled_at()
            .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
    }

    /// The non-local airport this flight depends on
    pub fn other_airport(&self) -> &str {
        match self.flight_type {
            FlightType::Arrival => &self.origin,
            FlightType::Departure => &self.destination,
        }
    }
}
