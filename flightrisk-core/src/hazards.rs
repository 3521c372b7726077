//! Weather hazard rules
//!
//! Pure, stateless scoring of a single airport's weather reading.
//! No I/O. Same inputs always produce the same outputs.
//!
//! Rules are independent and additive. Within a rule, severity bands form an
//! ordered ladder: the first matching band wins, most severe first. There is
//! no cap here; the blender caps once at the end.

use crate::crosswind::RunwayTable;
use crate::risk::{Factor, FactorCategory};
use crate::weather::WeatherReading;
use serde_json::json;

/// Band predicate on a single value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Below(f64),
    Above(f64),
    /// Matches any value (ladder fallback)
    Any,
}

impl Threshold {
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Threshold::Below(limit) => value < limit,
            Threshold::Above(limit) => value > limit,
            Threshold::Any => true,
        }
    }
}

/// One rung of a severity ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub when: Threshold,
    pub points: f64,
    pub label: &'static str,
}

const fn band(when: Threshold, points: f64, label: &'static str) -> Band {
    Band {
        when,
        points,
        label,
    }
}

pub const VISIBILITY_LADDER: &[Band] = &[
    band(Threshold::Below(0.5), 60.0, "Critical Visibility"),
    band(Threshold::Below(1.0), 40.0, "Low Visibility"),
    band(Threshold::Below(3.0), 15.0, "Reduced Visibility"),
];

pub const CROSSWIND_LADDER: &[Band] = &[
    band(Threshold::Above(25.0), 50.0, "Extreme Crosswind"),
    band(Threshold::Above(15.0), 30.0, "High Crosswind"),
    band(Threshold::Above(10.0), 10.0, "Moderate Crosswind"),
];

/// Used only when wind direction is unknown
pub const WIND_LADDER: &[Band] = &[
    band(Threshold::Above(40.0), 50.0, "Extreme Wind"),
    band(Threshold::Above(30.0), 30.0, "High Wind"),
    band(Threshold::Above(20.0), 10.0, "Breezy"),
];

pub const SNOW_DEPTH_LADDER: &[Band] = &[
    band(Threshold::Above(6.0), 40.0, "Deep Snow on Ground"),
    band(Threshold::Above(3.0), 25.0, "Snow on Ground"),
    band(Threshold::Above(1.0), 15.0, "Light Snow Cover"),
];

/// Below 32F; only consulted when precipitation is falling
pub const FREEZING_PRECIP_LADDER: &[Band] = &[
    band(Threshold::Above(0.3), 30.0, "Heavy Freezing Precipitation"),
    band(Threshold::Above(0.1), 20.0, "Freezing Precipitation"),
    band(Threshold::Any, 10.0, "Light Freezing Precipitation"),
];

/// At or above 32F (or temperature unknown)
pub const RAIN_LADDER: &[Band] = &[
    band(Threshold::Above(0.5), 15.0, "Heavy Rain"),
    band(Threshold::Above(0.1), 8.0, "Rain"),
];

const IFR_CLOUD_COVER: f64 = 90.0;
const IFR_VISIBILITY: f64 = 5.0;
const IFR_POINTS: f64 = 10.0;

const ICING_HUMIDITY: f64 = 80.0;
const ICING_POINTS: f64 = 20.0;
const ICING_TEXT_POINTS: f64 = 15.0;

/// Evaluate a ladder top-to-bottom and return the first matching band
pub fn first_band(ladder: &'static [Band], value: f64) -> Option<&'static Band> {
    ladder.iter().find(|b| b.when.matches(value))
}

/// Sub-score and fired rules for one reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherAssessment {
    pub score: f64,
    pub factors: Vec<Factor>,
}

impl WeatherAssessment {
    fn fire(&mut self, points: f64, description: String, details: serde_json::Value) {
        self.score += points;
        self.factors
            .push(Factor::new(FactorCategory::Weather, description, details));
    }
}

/// Score one airport's reading
///
/// `airport` selects the runway headings used for the crosswind rule.
pub fn assess_weather(
    reading: &WeatherReading,
    airport: &str,
    runways: &RunwayTable,
) -> WeatherAssessment {
    let mut out = WeatherAssessment::default();

    assess_visibility(reading, &mut out);
    assess_wind(reading, airport, runways, &mut out);
    assess_snow_depth(reading, &mut out);
    assess_precipitation(reading, &mut out);
    assess_ceiling(reading, &mut out);
    assess_icing(reading, &mut out);

    out
}

fn assess_visibility(reading: &WeatherReading, out: &mut WeatherAssessment) {
    let Some(vis) = reading.visibility_miles else {
        return;
    };
    if let Some(b) = first_band(VISIBILITY_LADDER, vis) {
        out.fire(
            b.points,
            format!("{} ({}mi)", b.label, vis),
            json!({"type": "Visibility", "value": vis, "penalty": b.points}),
        );
    }
}

fn assess_wind(
    reading: &WeatherReading,
    airport: &str,
    runways: &RunwayTable,
    out: &mut WeatherAssessment,
) {
    let Some(wind) = reading.effective_wind() else {
        return;
    };

    match runways.crosswind(Some(wind), reading.wind_direction, airport) {
        Some(crosswind) => {
            if let Some(b) = first_band(CROSSWIND_LADDER, crosswind) {
                let direction = reading.wind_direction.unwrap_or_default();
                out.fire(
                    b.points,
                    format!(
                        "{} ({:.1}kt, Wind {:.0}kt @ {:.0}°)",
                        b.label, crosswind, wind, direction
                    ),
                    json!({
                        "type": "Crosswind",
                        "crosswind": round1(crosswind),
                        "wind_speed": wind,
                        "wind_direction": direction,
                        "penalty": b.points,
                    }),
                );
            }
        }
        None => {
            if let Some(b) = first_band(WIND_LADDER, wind) {
                out.fire(
                    b.points,
                    format!("{} ({}kt)", b.label, wind),
                    json!({"type": "Wind", "value": wind, "penalty": b.points}),
                );
            }
        }
    }
}

fn assess_snow_depth(reading: &WeatherReading, out: &mut WeatherAssessment) {
    let Some(depth) = reading.snow_depth_in else {
        return;
    };
    if let Some(b) = first_band(SNOW_DEPTH_LADDER, depth) {
        out.fire(
            b.points,
            format!("{} ({}in)", b.label, depth),
            json!({"type": "SnowDepth", "value": depth, "penalty": b.points}),
        );
    }
}

fn assess_precipitation(reading: &WeatherReading, out: &mut WeatherAssessment) {
    let Some(precip) = reading.active_precipitation() else {
        return;
    };
    let ladder = if reading.is_freezing() {
        FREEZING_PRECIP_LADDER
    } else {
        RAIN_LADDER
    };
    if let Some(b) = first_band(ladder, precip) {
        out.fire(
            b.points,
            format!("{} ({}in/hr)", b.label, precip),
            json!({
                "type": "Precipitation",
                "value": precip,
                "freezing": reading.is_freezing(),
                "penalty": b.points,
            }),
        );
    }
}

fn assess_ceiling(reading: &WeatherReading, out: &mut WeatherAssessment) {
    let (Some(cloud), Some(vis)) = (reading.cloud_cover, reading.visibility_miles) else {
        return;
    };
    if cloud > IFR_CLOUD_COVER && vis < IFR_VISIBILITY {
        out.fire(
            IFR_POINTS,
            format!("Low Ceiling / IFR ({}% cloud, {}mi)", cloud, vis),
            json!({
                "type": "Ceiling",
                "cloud_cover": cloud,
                "visibility": vis,
                "penalty": IFR_POINTS,
            }),
        );
    }
}

fn assess_icing(reading: &WeatherReading, out: &mut WeatherAssessment) {
    let humid = reading.humidity.is_some_and(|h| h > ICING_HUMIDITY);
    if reading.is_freezing() && humid && reading.active_precipitation().is_some() {
        let temp = reading.temperature_f.unwrap_or_default();
        out.fire(
            ICING_POINTS,
            format!("Icing Conditions ({:.0}°F, Humid, Precipitating)", temp),
            json!({
                "type": "Icing",
                "temp": temp,
                "humidity": reading.humidity,
                "penalty": ICING_POINTS,
            }),
        );
    } else if reading.has_icing_text() {
        out.fire(
            ICING_TEXT_POINTS,
            "Icing Conditions (Snow/Ice Reported)".to_string(),
            json!({
                "type": "Icing",
                "conditions": reading.conditions,
                "penalty": ICING_TEXT_POINTS,
            }),
        );
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
