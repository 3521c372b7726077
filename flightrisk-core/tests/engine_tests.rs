//! End-to-end scoring against a seeded SQLite outcome store

use flightrisk_core::config::FlightRiskConfig;
use flightrisk_core::{
    AirportWeather, Breakdown, FactorCategory, FlightContext, FlightType, HistoricalFlight,
    PredictionEngine, ResolvedConfig, RiskLevel, RiskScore, SqliteOutcomeStore, WeatherReading,
};

const EPS: f64 = 1e-9;

fn config() -> ResolvedConfig {
    FlightRiskConfig::default()
        .resolve_with_data_dir(None)
        .expect("default config should resolve")
}

fn arrival(id: &str, scheduled: &str) -> FlightContext {
    FlightContext {
        id: id.to_string(),
        number: Some(id.to_string()),
        scheduled_time: Some(scheduled.to_string()),
        flight_type: FlightType::Arrival,
        origin: "SEA".to_string(),
        destination: "PUW".to_string(),
    }
}

fn outcome(number: &str, date: &str, cancelled: bool) -> HistoricalFlight {
    HistoricalFlight {
        flight_number: number.to_string(),
        flight_date: date.to_string(),
        flight_type: Some(FlightType::Arrival),
        origin: Some("SEA".to_string()),
        destination: Some("PUW".to_string()),
        is_cancelled: cancelled,
        local_weather: WeatherReading::default(),
        origin_weather: WeatherReading::default(),
        destination_weather: WeatherReading::default(),
    }
}

fn low_visibility(vis: f64) -> WeatherReading {
    WeatherReading {
        visibility_miles: Some(vis),
        ..Default::default()
    }
}

#[test]
fn test_visibility_analogs_average_into_score() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    for i in 0..10 {
        let mut rec = outcome(&format!("AS{i}"), "2024-12-01", i < 6);
        rec.local_weather = low_visibility(0.5);
        store.record_outcome(&rec).expect("insert should succeed");
    }
    // Clear day: not an analog
    let mut clear = outcome("AS99", "2024-12-02", false);
    clear.local_weather = low_visibility(10.0);
    store.record_outcome(&clear).expect("insert should succeed");

    let engine = PredictionEngine::with_calibration_factor(&store, &config(), 1.0);
    let risk = engine.calculate_risk(
        &arrival("AS2156", "2025-10-10T10:00:00-07:00"),
        &AirportWeather::local(low_visibility(0.8)),
    );

    // 0.1 + 40 = 40.1; history 60% -> (40.1 + 60) / 2
    assert!((risk.score - 50.05).abs() < EPS);
    assert_eq!(risk.risk_level, RiskLevel::Medium);
    assert_eq!(
        risk.factors,
        vec![
            "Low Visibility (0.8mi)".to_string(),
            "History: 60% cancelled when Vis < 1.3mi (6/10)".to_string(),
        ]
    );
    assert_eq!(risk.detailed_factors[1].details["total_flights"], 10);
}

#[test]
fn test_calibration_learned_from_logged_predictions() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    let predicted = RiskScore::new(
        Vec::new(),
        Breakdown {
            calibrated_score: 20.0,
            ..Default::default()
        },
    );

    // 30 matched predictions at 20, 6 cancelled -> 20% / 20 = 1.0
    for i in 0..30 {
        let number = format!("AS{i}");
        store
            .record_outcome(&outcome(&number, "2025-02-01", i < 6))
            .expect("insert should succeed");
        store
            .log_prediction(
                &arrival(&number, "2025-02-01T08:00:00-08:00"),
                &AirportWeather::default(),
                &predicted,
                "2025-02-01T00:00:00+00:00",
            )
            .expect("log should succeed");
    }

    let engine = PredictionEngine::new(&store, &config());
    assert!((engine.calibration().factor - 1.0).abs() < EPS);
    assert_eq!(engine.calibration().samples, 30);
    assert_eq!(engine.calibration().cancellations, 6);
}

#[test]
fn test_unmatched_predictions_do_not_calibrate() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    let predicted = RiskScore::new(
        Vec::new(),
        Breakdown {
            calibrated_score: 80.0,
            ..Default::default()
        },
    );
    for i in 0..40 {
        store
            .log_prediction(
                &arrival(&format!("AS{i}"), "2025-02-01T08:00:00-08:00"),
                &AirportWeather::default(),
                &predicted,
                "2025-02-01T00:00:00+00:00",
            )
            .expect("log should succeed");
    }

    let engine = PredictionEngine::new(&store, &config());
    assert_eq!(engine.calibration().factor, 0.5);
    assert_eq!(engine.calibration().samples, 0);
}

#[test]
fn test_multi_airport_origin_analogs() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    for i in 0..5 {
        let mut rec = outcome(&format!("AS{i}"), &format!("2024-11-0{}", i + 1), true);
        rec.origin_weather = low_visibility(0.5);
        store.record_outcome(&rec).expect("insert should succeed");
    }
    // Departures in the same conditions are not arrival analogs
    for i in 0..5 {
        let mut rec = outcome(&format!("QX{i}"), "2024-11-01", false);
        rec.flight_type = Some(FlightType::Departure);
        rec.origin_weather = low_visibility(0.5);
        store.record_outcome(&rec).expect("insert should succeed");
    }

    let engine = PredictionEngine::with_calibration_factor(&store, &config(), 1.0);
    let weather = AirportWeather {
        local: Some(WeatherReading::default()),
        origin: Some(low_visibility(0.8)),
        destination: None,
    };
    let risk = engine.calculate_risk(&arrival("AS2156", "2025-10-10T10:00:00-07:00"), &weather);

    // 0.1 + 0.7 * 40 = 28.1; origin history 100% -> (28.1 + 100) / 2
    assert!((risk.score - 64.05).abs() < EPS);
    assert!((risk.breakdown.origin_weather - 28.0).abs() < EPS);
    let history: Vec<&str> = risk
        .detailed_factors
        .iter()
        .filter(|f| f.category == FactorCategory::History)
        .map(|f| f.description.as_str())
        .collect();
    assert_eq!(
        history,
        vec!["History (SEA): 100% of arrivals cancelled in similar conditions (5/5)"]
    );
}

#[test]
fn test_four_origin_analogs_are_not_enough() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    for i in 0..4 {
        let mut rec = outcome(&format!("AS{i}"), &format!("2024-11-0{}", i + 1), true);
        rec.origin_weather = low_visibility(0.5);
        store.record_outcome(&rec).expect("insert should succeed");
    }

    let engine = PredictionEngine::with_calibration_factor(&store, &config(), 1.0);
    let weather = AirportWeather {
        local: None,
        origin: Some(low_visibility(0.8)),
        destination: None,
    };
    let risk = engine.calculate_risk(&arrival("AS2156", "2025-10-10T10:00:00-07:00"), &weather);

    // 0.1 + 0.7 * 40, no history blend
    assert!((risk.score - 28.1).abs() < EPS);
    assert_eq!(risk.breakdown.history_adjustment, 0.0);
    assert!(risk
        .detailed_factors
        .iter()
        .all(|f| f.category != FactorCategory::History));
}

#[test]
fn test_departure_destination_weight() {
    let store = SqliteOutcomeStore::open_in_memory().expect("store should open");
    let engine = PredictionEngine::with_calibration_factor(&store, &config(), 1.0);
    let flight = FlightContext {
        id: "QX2100".to_string(),
        number: None,
        scheduled_time: Some("2025-10-10T06:00:00-07:00".to_string()),
        flight_type: FlightType::Departure,
        origin: "PUW".to_string(),
        destination: "KBOI".to_string(),
    };
    let weather = AirportWeather {
        local: None,
        origin: None,
        destination: Some(WeatherReading {
            snow_depth_in: Some(7.0),
            ..Default::default()
        }),
    };
    let risk = engine.calculate_risk(&flight, &weather);

    // 0.1 + 0.6 * 40
    assert!((risk.score - 24.1).abs() < EPS);
    assert_eq!(risk.detailed_factors[0].category, FactorCategory::Destination);
    assert!(risk.factors[0].starts_with("BOI arrival weather"));
}

#[test]
fn test_scoring_from_disk_store() {
    let dir = tempfile::tempdir().expect("failed to create temp directory");
    let db = dir.path().join("data").join("history.db");

    {
        let store = SqliteOutcomeStore::open(&db).expect("store should open");
        for i in 0..5 {
            let mut rec = outcome(&format!("AS{i}"), "2024-12-01", true);
            rec.local_weather = WeatherReading {
                wind_speed_knots: Some(20.0),
                wind_gust_knots: Some(40.0),
                ..Default::default()
            };
            store.record_outcome(&rec).expect("insert should succeed");
        }
    }

    let store = SqliteOutcomeStore::open(&db).expect("store should reopen");
    let engine = PredictionEngine::with_calibration_factor(&store, &config(), 1.0);
    let risk = engine.calculate_risk(
        &arrival("AS2156", "2025-10-10T10:00:00-07:00"),
        &AirportWeather::local(WeatherReading {
            wind_speed_knots: Some(38.0),
            ..Default::default()
        }),
    );

    // 0.1 + High Wind 30 = 30.1; wind analogs 100% -> max
    assert!((risk.score - 99.0).abs() < EPS);
    assert!((risk.breakdown.cap_adjustment + 1.0).abs() < EPS);
    assert_eq!(
        risk.factors.last().map(String::as_str),
        Some("History: 100% cancelled when Wind > 33kt (5/5)")
    );
}
