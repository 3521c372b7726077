//! Historical analog matching
//!
//! Builds "worse-or-equal" filters from a weather fingerprint and counts the
//! past flights that satisfy them. Counting happens inside the store.
//!
//! Global invariants enforced:
//! - Absent fingerprint fields omit their clause (never an always-false filter)
//! - Clauses are ANDed in a fixed order
//! - Store failures yield zero counts; analog data is best-effort enrichment

use crate::flight::FlightType;
use crate::store::OutcomeStore;
use crate::weather::WeatherReading;
use serde::{Deserialize, Serialize};

/// Which airport's stored weather a clause compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirportScope {
    Local,
    Origin,
    Destination,
}

impl AirportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AirportScope::Local => "local",
            AirportScope::Origin => "origin",
            AirportScope::Destination => "destination",
        }
    }

    /// Scope holding the non-local end of a flight of the given type
    pub fn other_end(flight_type: FlightType) -> AirportScope {
        match flight_type {
            FlightType::Arrival => AirportScope::Origin,
            FlightType::Departure => AirportScope::Destination,
        }
    }
}

/// Stored weather quantity a clause compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredField {
    Visibility,
    /// Gust when recorded, otherwise sustained wind
    EffectiveWind,
    SnowDepth,
    Precipitation,
    Temperature,
}

/// Comparison applied to the stored value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtMost(f64),
    AtLeast(f64),
    Above(f64),
    Below(f64),
}

impl Comparison {
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::AtMost(_) => "<=",
            Comparison::AtLeast(_) => ">=",
            Comparison::Above(_) => ">",
            Comparison::Below(_) => "<",
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Comparison::AtMost(v)
            | Comparison::AtLeast(v)
            | Comparison::Above(v)
            | Comparison::Below(v) => v,
        }
    }
}

/// One ANDed condition of an analog filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub scope: AirportScope,
    pub field: StoredField,
    pub cmp: Comparison,
}

/// Complete analog query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalogFilter {
    /// Restrict to flights of this operation direction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_type: Option<FlightType>,
    pub clauses: Vec<Clause>,
}

impl AnalogFilter {
    /// No weather clause at all (would match every stored flight)
    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Human-readable criteria, e.g. "local visibility <= 1.3, local effective_wind >= 20.0"
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .clauses
            .iter()
            .map(|c| {
                format!(
                    "{} {} {} {:.1}",
                    c.scope.as_str(),
                    field_name(c.field),
                    c.cmp.operator(),
                    c.cmp.value()
                )
            })
            .collect();
        if let Some(t) = self.flight_type {
            parts.push(format!("type = {}", t.as_str()));
        }
        parts.join(", ")
    }

    fn push(&mut self, scope: AirportScope, field: StoredField, cmp: Comparison) {
        self.clauses.push(Clause { scope, field, cmp });
    }
}

fn field_name(field: StoredField) -> &'static str {
    match field {
        StoredField::Visibility => "visibility",
        StoredField::EffectiveWind => "effective_wind",
        StoredField::SnowDepth => "snow_depth",
        StoredField::Precipitation => "precipitation",
        StoredField::Temperature => "temperature",
    }
}

/// Subset of a reading used to find analogs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub visibility: Option<f64>,
    pub effective_wind: Option<f64>,
    pub snow_depth: Option<f64>,
    pub precipitation: Option<f64>,
    pub temperature: Option<f64>,
}

impl Fingerprint {
    /// Comprehensive fingerprint of a reading
    pub fn from_reading(reading: &WeatherReading) -> Self {
        Fingerprint {
            visibility: reading.visibility_miles,
            effective_wind: reading.effective_wind(),
            snow_depth: reading.snow_depth_in,
            precipitation: reading.precipitation_in,
            temperature: reading.temperature_f,
        }
    }

    /// Fields the local-airport matcher understands (visibility, wind, temperature)
    pub fn local_signals(reading: &WeatherReading) -> Self {
        Fingerprint {
            visibility: reading.visibility_miles,
            effective_wind: reading.effective_wind(),
            temperature: reading.temperature_f,
            ..Default::default()
        }
    }

    pub fn visibility_only(visibility: f64) -> Self {
        Fingerprint {
            visibility: Some(visibility),
            ..Default::default()
        }
    }

    pub fn wind_only(effective_wind: f64) -> Self {
        Fingerprint {
            effective_wind: Some(effective_wind),
            ..Default::default()
        }
    }

    pub fn temperature_only(temperature: f64) -> Self {
        Fingerprint {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

/// Filter for the local airport (single-airport policy)
///
/// - Visibility < 2.0: stored <= q + 0.5; otherwise stored > 2.0
/// - Effective wind > 15: stored >= q - 5
/// - Temperature < 34: stored < 34
pub fn local_filter(fp: &Fingerprint) -> AnalogFilter {
    let scope = AirportScope::Local;
    let mut filter = AnalogFilter::default();

    if let Some(vis) = fp.visibility {
        if vis < 2.0 {
            filter.push(scope, StoredField::Visibility, Comparison::AtMost(vis + 0.5));
        } else {
            filter.push(scope, StoredField::Visibility, Comparison::Above(2.0));
        }
    }
    if let Some(wind) = fp.effective_wind {
        if wind > 15.0 {
            filter.push(scope, StoredField::EffectiveWind, Comparison::AtLeast(wind - 5.0));
        }
    }
    if let Some(temp) = fp.temperature {
        if temp < 34.0 {
            filter.push(scope, StoredField::Temperature, Comparison::Below(34.0));
        }
    }

    filter
}

/// Filter for the other end of a flight (multi-airport policy)
///
/// - Visibility < 3.0: stored <= q + 0.5
/// - Effective wind > 20: stored >= q - 5
/// - Snow depth > 1: stored >= max(0, q - 2)
/// - Precipitation > 0.1: stored >= max(0, q - 0.1)
/// - Below freezing with precipitation: stored temperature < 32
pub fn remote_filter(fp: &Fingerprint, scope: AirportScope, flight_type: FlightType) -> AnalogFilter {
    let mut filter = AnalogFilter {
        flight_type: Some(flight_type),
        clauses: Vec::new(),
    };

    if let Some(vis) = fp.visibility {
        if vis < 3.0 {
            filter.push(scope, StoredField::Visibility, Comparison::AtMost(vis + 0.5));
        }
    }
    if let Some(wind) = fp.effective_wind {
        if wind > 20.0 {
            filter.push(scope, StoredField::EffectiveWind, Comparison::AtLeast(wind - 5.0));
        }
    }
    if let Some(depth) = fp.snow_depth {
        if depth > 1.0 {
            filter.push(
                scope,
                StoredField::SnowDepth,
                Comparison::AtLeast((depth - 2.0).max(0.0)),
            );
        }
    }
    if let Some(precip) = fp.precipitation {
        if precip > 0.1 {
            filter.push(
                scope,
                StoredField::Precipitation,
                Comparison::AtLeast((precip - 0.1).max(0.0)),
            );
        }
    }
    let freezing_precip = fp.temperature.is_some_and(|t| t < 32.0)
        && fp.precipitation.is_some_and(|p| p > 0.0);
    if freezing_precip {
        filter.push(scope, StoredField::Temperature, Comparison::Below(32.0));
    }

    filter
}

/// `(total, cancelled)` for one analog query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogCounts {
    pub total: u64,
    pub cancelled: u64,
}

impl AnalogCounts {
    pub fn new(total: u64, cancelled: u64) -> Self {
        AnalogCounts { total, cancelled }
    }

    /// Cancellation rate in percent, if at least `min_total` analogs matched
    pub fn rate_if_at_least(&self, min_total: u64) -> Option<f64> {
        if self.total == 0 || self.total < min_total {
            return None;
        }
        Some(self.cancelled as f64 / self.total as f64 * 100.0)
    }
}

/// Count analogs, swallowing store failures as "no analog data"
pub fn count_analogs<S: OutcomeStore + ?Sized>(store: &S, filter: &AnalogFilter) -> AnalogCounts {
    match store.find_analogs(filter) {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!(
                error = ?e,
                criteria = %filter.describe(),
                "analog query failed; treating as no data"
            );
            AnalogCounts::default()
        }
    }
}
