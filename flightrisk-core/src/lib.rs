//! FlightRisk core library - weather-driven flight cancellation risk scoring

// Global invariants enforced in this crate:
// - Scoring is synchronous and never fails; missing data disables rules
// - No global mutable state
// - No clocks inside scoring; callers supply timestamps
// - Calibration is read once per engine, never during a calculation
// - Factor order follows rule evaluation order
// - Identical input and an unchanged log yield byte-for-byte identical output

pub mod analogs;
pub mod blend;
pub mod calibration;
pub mod config;
pub mod crosswind;
pub mod engine;
pub mod flight;
pub mod grading;
pub mod hazards;
pub mod report;
pub mod risk;
pub mod seasonal;
pub mod store;
pub mod weather;

pub use calibration::{Calibration, CalibrationSample};
pub use config::ResolvedConfig;
pub use engine::{PredictionEngine, ScoreRequest};
pub use flight::{FlightContext, FlightType};
pub use grading::{grade, Grade, Outcome, StoredPrediction};
pub use report::{render_json, render_text, ScoredFlight};
pub use risk::{Breakdown, Factor, FactorCategory, RiskLevel, RiskScore};
pub use store::{HistoricalFlight, OutcomeStore, SqliteOutcomeStore};
pub use weather::{AirportWeather, WeatherReading};
