//! Score blending
//!
//! Combines the seasonal baseline, weather sub-scores and historical analog
//! rates into a raw score capped to [0, 99].
//!
//! Global invariants enforced:
//! - Breakdown components sum to `final_score` (cap recorded as `cap_adjustment`)
//! - Single-airport history blends in fixed order: visibility (average), wind (max), icing (max)
//! - Remote rule factors appear only when their weighted contribution is added

use crate::analogs::{
    count_analogs, local_filter, remote_filter, AirportScope, AnalogCounts, AnalogFilter,
    Fingerprint,
};
use crate::crosswind::{normalize_code, RunwayTable};
use crate::flight::{FlightContext, FlightType};
use crate::hazards::{assess_weather, WeatherAssessment};
use crate::risk::{Breakdown, Factor, FactorCategory, RAW_SCORE_CAP};
use crate::seasonal::{month_name, seasonal_baseline, NOTABLE_BASELINE};
use crate::store::OutcomeStore;
use crate::weather::{AirportWeather, WeatherReading};
use serde_json::json;

/// Analogs needed before a single-airport rate is trusted
pub const SINGLE_AIRPORT_MIN_ANALOGS: u64 = 5;

/// Analogs needed for the local rate on the multi-airport path
pub const MULTI_LOCAL_MIN_ANALOGS: u64 = 10;

/// Analogs needed for the other-airport rate on the multi-airport path
pub const MULTI_REMOTE_MIN_ANALOGS: u64 = 5;

/// Remote sub-scores at or below this are ignored
pub const REMOTE_SUBSCORE_GATE: f64 = 20.0;

/// Weight of the origin sub-score for arrivals
pub const ORIGIN_WEIGHT: f64 = 0.7;

/// Weight of the destination sub-score for departures
pub const DESTINATION_WEIGHT: f64 = 0.6;

/// Raw (uncalibrated) result of one blend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBlend {
    pub factors: Vec<Factor>,
    /// Calibration fields are left at their defaults
    pub breakdown: Breakdown,
}

/// How an analog rate is folded into the running score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendRule {
    Average,
    Max,
}

impl BlendRule {
    fn as_str(&self) -> &'static str {
        match self {
            BlendRule::Average => "average",
            BlendRule::Max => "max",
        }
    }
}

pub struct Blender<'a, S: OutcomeStore + ?Sized> {
    store: &'a S,
    runways: &'a RunwayTable,
    local_airport: &'a str,
}

impl<'a, S: OutcomeStore + ?Sized> Blender<'a, S> {
    pub fn new(store: &'a S, runways: &'a RunwayTable, local_airport: &'a str) -> Self {
        Blender {
            store,
            runways,
            local_airport,
        }
    }

    /// Blend one flight; picks the multi-airport path when remote weather is present
    pub fn blend(&self, flight: &FlightContext, weather: &AirportWeather) -> RawBlend {
        let mut out = RawBlend::default();
        let mut score = self.apply_seasonal(flight, &mut out);

        if weather.is_multi_airport() {
            tracing::debug!(flight = %flight.id, "multi-airport blend");
            score = self.multi_airport(flight, weather, score, &mut out);
        } else {
            tracing::debug!(flight = %flight.id, "single-airport blend");
            if let Some(local) = &weather.local {
                score = self.single_airport(local, score, &mut out);
            }
        }

        let capped = score.clamp(0.0, RAW_SCORE_CAP);
        out.breakdown.cap_adjustment = capped - score;
        out.breakdown.final_score = capped;
        out
    }

    /// Seasonal baseline, or 0 when the scheduled time is missing or unparseable
    fn apply_seasonal(&self, flight: &FlightContext, out: &mut RawBlend) -> f64 {
        let Some(month) = flight.scheduled_month() else {
            tracing::debug!(flight = %flight.id, "no usable scheduled time; seasonal baseline 0");
            return 0.0;
        };

        let baseline = seasonal_baseline(month);
        out.breakdown.seasonal_baseline = baseline;
        if baseline > NOTABLE_BASELINE {
            let name = month_name(month);
            out.factors.push(Factor::new(
                FactorCategory::Seasonal,
                format!(
                    "Seasonal Baseline: {baseline}% (High for {})",
                    name.get(..3).unwrap_or(name)
                ),
                json!({ "month": name, "baseline": baseline }),
            ));
        }
        baseline
    }

    fn single_airport(&self, local: &WeatherReading, mut score: f64, out: &mut RawBlend) -> f64 {
        let assessment = assess_weather(local, self.local_airport, self.runways);
        score += assessment.score;
        out.breakdown.weather_score = assessment.score;
        out.factors.extend(assessment.factors);

        if let Some(vis) = local.visibility_miles.filter(|v| *v < 3.0) {
            let criteria = if vis < 2.0 {
                format!("Visibility < {:.1}mi", vis + 0.5)
            } else {
                "Visibility > 2.0mi".to_string()
            };
            let description = if vis < 2.0 {
                format!("when Vis < {:.1}mi", vis + 0.5)
            } else {
                "when Vis > 2.0mi".to_string()
            };
            score = self.blend_history(
                &local_filter(&Fingerprint::visibility_only(vis)),
                &description,
                &criteria,
                BlendRule::Average,
                score,
                out,
            );
        }

        if let Some(wind) = local.effective_wind().filter(|w| *w > 20.0) {
            score = self.blend_history(
                &local_filter(&Fingerprint::wind_only(wind)),
                &format!("when Wind > {:.0}kt", wind - 5.0),
                &format!("Wind > {:.0}kt", wind - 5.0),
                BlendRule::Max,
                score,
                out,
            );
        }

        if let (true, Some(temp)) = (local.has_freezing_precip_signal(), local.temperature_f) {
            score = self.blend_history(
                &local_filter(&Fingerprint::temperature_only(temp)),
                "in freezing temps",
                "Freezing Temps + Precip",
                BlendRule::Max,
                score,
                out,
            );
        }

        score
    }

    /// Fold one single-airport analog rate into `score`
    fn blend_history(
        &self,
        filter: &AnalogFilter,
        description: &str,
        criteria: &str,
        rule: BlendRule,
        score: f64,
        out: &mut RawBlend,
    ) -> f64 {
        let counts = count_analogs(self.store, filter);
        let Some(rate) = counts.rate_if_at_least(SINGLE_AIRPORT_MIN_ANALOGS) else {
            return score;
        };

        out.factors.push(history_factor(
            format!(
                "History: {}% cancelled {description} ({}/{})",
                rate as i64, counts.cancelled, counts.total
            ),
            criteria,
            counts,
            rate,
            rule,
        ));

        match rule {
            BlendRule::Average => {
                let blended = (score + rate) / 2.0;
                out.breakdown.history_adjustment += blended - score;
                blended
            }
            BlendRule::Max => {
                if rate > score {
                    out.breakdown.history_adjustment += rate - score;
                    rate
                } else {
                    score
                }
            }
        }
    }

    fn multi_airport(
        &self,
        flight: &FlightContext,
        weather: &AirportWeather,
        mut score: f64,
        out: &mut RawBlend,
    ) -> f64 {
        if let Some(local) = &weather.local {
            let assessment = assess_weather(local, self.local_airport, self.runways);
            if assessment.score > 0.0 {
                score += assessment.score;
                out.breakdown.weather_score = assessment.score;
                out.factors.extend(assessment.factors);
            }
        }

        match (flight.flight_type, &weather.origin, &weather.destination) {
            (FlightType::Arrival, Some(origin), _) => {
                let assessment = assess_weather(origin, &flight.origin, self.runways);
                let contribution = self.remote_contribution(
                    assessment,
                    &flight.origin,
                    flight.flight_type.opposite(),
                    ORIGIN_WEIGHT,
                    FactorCategory::Origin,
                    out,
                );
                score += contribution;
                out.breakdown.origin_weather = contribution;
            }
            (FlightType::Departure, _, Some(destination)) => {
                let assessment = assess_weather(destination, &flight.destination, self.runways);
                let contribution = self.remote_contribution(
                    assessment,
                    &flight.destination,
                    flight.flight_type.opposite(),
                    DESTINATION_WEIGHT,
                    FactorCategory::Destination,
                    out,
                );
                score += contribution;
                out.breakdown.destination_weather = contribution;
            }
            _ => {}
        }

        let mut rates = Vec::new();
        if let Some(rate) = weather
            .local
            .as_ref()
            .and_then(|local| self.local_rate(local, out))
        {
            rates.push(rate);
        }
        if let Some(rate) = self.remote_rate(flight, weather, out) {
            rates.push(rate);
        }

        if rates.is_empty() {
            return score;
        }
        let avg = rates.iter().sum::<f64>() / rates.len() as f64;
        let blended = (score + avg) / 2.0;
        out.breakdown.history_adjustment = blended - score;
        blended
    }

    /// Weighted contribution of the other airport's sub-score (0 at or below the gate)
    fn remote_contribution(
        &self,
        assessment: WeatherAssessment,
        airport: &str,
        operation: FlightType,
        weight: f64,
        category: FactorCategory,
        out: &mut RawBlend,
    ) -> f64 {
        if assessment.score <= REMOTE_SUBSCORE_GATE {
            return 0.0;
        }

        let code = normalize_code(airport);
        let contribution = weight * assessment.score;
        out.factors.push(Factor::new(
            category,
            format!(
                "{code} {} weather: +{contribution:.1} ({:.0} x {weight})",
                operation.as_str(),
                assessment.score
            ),
            json!({
                "airport": code,
                "operation": operation.as_str(),
                "sub_score": assessment.score,
                "weight": weight,
                "contribution": contribution,
            }),
        ));

        for factor in assessment.factors {
            let mut details = factor.details;
            if let Some(map) = details.as_object_mut() {
                map.insert("airport".to_string(), json!(code));
                map.insert("operation".to_string(), json!(operation.as_str()));
            }
            out.factors.push(Factor::new(
                category,
                format!("{code}: {}", factor.description),
                details,
            ));
        }

        contribution
    }

    /// Local analog rate on the multi-airport path; queried only when a local signal is crossed
    fn local_rate(&self, local: &WeatherReading, out: &mut RawBlend) -> Option<f64> {
        let crossed = local.visibility_miles.is_some_and(|v| v < 3.0)
            || local.effective_wind().is_some_and(|w| w > 20.0)
            || local.has_freezing_precip_signal();
        if !crossed {
            return None;
        }

        let filter = local_filter(&Fingerprint::local_signals(local));
        if filter.is_unconstrained() {
            return None;
        }
        let counts = count_analogs(self.store, &filter);
        let rate = counts.rate_if_at_least(MULTI_LOCAL_MIN_ANALOGS)?;

        let code = normalize_code(self.local_airport);
        out.factors.push(history_factor(
            format!(
                "History ({code}): {}% cancelled in similar local conditions ({}/{})",
                rate as i64, counts.cancelled, counts.total
            ),
            &filter.describe(),
            counts,
            rate,
            BlendRule::Average,
        ));
        Some(rate)
    }

    /// Other-airport analog rate for the flight's operation direction
    fn remote_rate(
        &self,
        flight: &FlightContext,
        weather: &AirportWeather,
        out: &mut RawBlend,
    ) -> Option<f64> {
        let reading = match flight.flight_type {
            FlightType::Arrival => weather.origin.as_ref(),
            FlightType::Departure => weather.destination.as_ref(),
        }?;

        let filter = remote_filter(
            &Fingerprint::from_reading(reading),
            AirportScope::other_end(flight.flight_type),
            flight.flight_type,
        );
        if filter.is_unconstrained() {
            return None;
        }
        let counts = count_analogs(self.store, &filter);
        let rate = counts.rate_if_at_least(MULTI_REMOTE_MIN_ANALOGS)?;

        let code = normalize_code(flight.other_airport());
        out.factors.push(history_factor(
            format!(
                "History ({code}): {}% of {}s cancelled in similar conditions ({}/{})",
                rate as i64,
                flight.flight_type.as_str(),
                counts.cancelled,
                counts.total
            ),
            &filter.describe(),
            counts,
            rate,
            BlendRule::Average,
        ));
        Some(rate)
    }
}

fn history_factor(
    description: String,
    criteria: &str,
    counts: AnalogCounts,
    rate: f64,
    rule: BlendRule,
) -> Factor {
    Factor::new(
        FactorCategory::History,
        description,
        json!({
            "match_criteria": criteria,
            "total_flights": counts.total,
            "cancelled_flights": counts.cancelled,
            "cancellation_rate": rate as i64,
            "blend": rule.as_str(),
        }),
    )
}
