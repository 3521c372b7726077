//! Prediction engine
//!
//! Owns the outcome store handle, the runway table and a calibration factor
//! read once at construction. Scoring never fails: missing data disables the
//! rules that need it.

use crate::blend::Blender;
use crate::calibration::Calibration;
use crate::config::ResolvedConfig;
use crate::crosswind::{normalize_code, RunwayTable};
use crate::flight::FlightContext;
use crate::risk::RiskScore;
use crate::store::OutcomeStore;
use crate::weather::AirportWeather;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One flight to score with its weather
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub flight: FlightContext,
    #[serde(default)]
    pub weather: AirportWeather,
}

pub struct PredictionEngine<S: OutcomeStore> {
    store: S,
    calibration: Calibration,
    runways: RunwayTable,
    local_airport: String,
}

impl<S: OutcomeStore> PredictionEngine<S> {
    /// Build an engine, learning the calibration factor from the store
    ///
    /// An unreadable prediction log falls back to the default factor.
    pub fn new(store: S, config: &ResolvedConfig) -> Self {
        let calibration = match store.calibration_inputs() {
            Ok(samples) => Calibration::from_samples(&samples),
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    "calibration inputs unavailable; using default factor"
                );
                Calibration::fixed(crate::calibration::DEFAULT_FACTOR)
            }
        };
        tracing::debug!(
            factor = calibration.factor,
            samples = calibration.samples,
            cancellations = calibration.cancellations,
            "calibration computed"
        );
        Self::with_calibration(store, config, calibration)
    }

    /// Build an engine with an injected calibration (no store read)
    pub fn with_calibration(store: S, config: &ResolvedConfig, calibration: Calibration) -> Self {
        PredictionEngine {
            store,
            calibration,
            runways: config.runways.clone(),
            local_airport: normalize_code(&config.local_airport),
        }
    }

    /// Build an engine with a fixed factor
    pub fn with_calibration_factor(store: S, config: &ResolvedConfig, factor: f64) -> Self {
        Self::with_calibration(store, config, Calibration::fixed(factor))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Score one flight
    pub fn calculate_risk(&self, flight: &FlightContext, weather: &AirportWeather) -> RiskScore {
        let blender = Blender::new(&self.store, &self.runways, &self.local_airport);
        let raw = blender.blend(flight, weather);

        let mut breakdown = raw.breakdown;
        let calibrated = self.calibration.apply(breakdown.final_score);
        breakdown.calibration_factor = self.calibration.factor;
        breakdown.calibrated_score = calibrated;
        breakdown.calibration_delta = calibrated - breakdown.final_score;

        RiskScore::new(raw.factors, breakdown)
    }

    /// Score many flights in parallel; output order matches input order
    pub fn score_batch(&self, requests: &[ScoreRequest]) -> Vec<RiskScore> {
        requests
            .par_iter()
            .map(|r| self.calculate_risk(&r.flight, &r.weather))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analogs::{AnalogCounts, AnalogFilter};
    use crate::calibration::CalibrationSample;
    use crate::flight::FlightType;
    use crate::risk::RiskLevel;
    use crate::weather::WeatherReading;
    use anyhow::Result;

    struct EmptyStore;

    impl OutcomeStore for EmptyStore {
        fn find_analogs(&self, _filter: &AnalogFilter) -> Result<AnalogCounts> {
            Ok(AnalogCounts::default())
        }

        fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>> {
            Ok(Vec::new())
        }
    }

    struct BrokenLog;

    impl OutcomeStore for BrokenLog {
        fn find_analogs(&self, _filter: &AnalogFilter) -> Result<AnalogCounts> {
            Ok(AnalogCounts::default())
        }

        fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>> {
            anyhow::bail!("no such table: history_log")
        }
    }

    fn config() -> ResolvedConfig {
        crate::config::FlightRiskConfig::default()
            .resolve_with_data_dir(None)
            .unwrap()
    }

    fn flight(id: &str) -> FlightContext {
        FlightContext {
            id: id.to_string(),
            number: None,
            scheduled_time: Some("2025-10-10T10:00:00-07:00".to_string()),
            flight_type: FlightType::Arrival,
            origin: "SEA".to_string(),
            destination: "PUW".to_string(),
        }
    }

    #[test]
    fn test_calibration_applied_after_cap() {
        let engine = PredictionEngine::with_calibration_factor(EmptyStore, &config(), 1.0);
        let weather = AirportWeather::local(WeatherReading {
            visibility_miles: Some(0.3),
            ..Default::default()
        });
        let risk = engine.calculate_risk(&flight("f1"), &weather);
        // 0.1 + 60
        assert!((risk.score - 60.1).abs() < 1e-9);
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert_eq!(risk.breakdown.calibration_delta, 0.0);
    }

    #[test]
    fn test_level_follows_calibrated_score() {
        let engine = PredictionEngine::with_calibration_factor(EmptyStore, &config(), 2.0);
        let weather = AirportWeather::local(WeatherReading {
            visibility_miles: Some(0.8),
            ..Default::default()
        });
        let risk = engine.calculate_risk(&flight("f1"), &weather);
        // raw 40.1 -> 80.2
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert!((risk.breakdown.final_score - 40.1).abs() < 1e-9);
        assert!(
            (risk.breakdown.final_score + risk.breakdown.calibration_delta
                - risk.breakdown.calibrated_score)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_broken_log_falls_back() {
        let engine = PredictionEngine::new(BrokenLog, &config());
        assert_eq!(engine.calibration().factor, 0.5);
    }

    #[test]
    fn test_batch_preserves_order() {
        let engine = PredictionEngine::with_calibration_factor(EmptyStore, &config(), 1.0);
        let requests: Vec<ScoreRequest> = (0..20)
            .map(|i| ScoreRequest {
                flight: flight(&format!("f{i}")),
                weather: AirportWeather::local(WeatherReading {
                    visibility_miles: Some(if i % 2 == 0 { 0.3 } else { 10.0 }),
                    ..Default::default()
                }),
            })
            .collect();
        let scores = engine.score_batch(&requests);
        assert_eq!(scores.len(), 20);
        for (i, s) in scores.iter().enumerate() {
            let expected = engine.calculate_risk(&requests[i].flight, &requests[i].weather);
            assert_eq!(s, &expected);
        }
    }
}
