//! SQLite-backed outcome store
//!
//! Global invariants enforced:
//! - One historical record per (flight number, date)
//! - One logged prediction per flight id; re-logging keeps the observed status
//! - Analog counting happens in SQL, never by loading rows

use super::{percent, HistoricalFlight, HistoryRange, MonthlyStats, OutcomeStore, RecentStats};
use crate::analogs::{AirportScope, AnalogCounts, AnalogFilter, StoredField};
use crate::calibration::CalibrationSample;
use crate::flight::FlightContext;
use crate::grading::StoredPrediction;
use crate::risk::{assign_risk_level, RiskLevel, RiskScore};
use crate::weather::{AirportWeather, WeatherReading};
use anyhow::{anyhow, Context, Result};
use chrono::{Days, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Per-scope weather columns, in insert order
const WEATHER_COLUMNS: [&str; 7] = [
    "visibility",
    "wind_speed",
    "wind_gust",
    "wind_direction",
    "temperature",
    "precipitation",
    "snow_depth",
];

const SCOPE_PREFIXES: [&str; 3] = ["local", "origin", "dest"];

/// Weather snapshot columns on `history_log`: the numeric columns plus the
/// conditions text, for each scope
fn snapshot_columns() -> Vec<(String, &'static str)> {
    let mut columns = Vec::new();
    for prefix in SCOPE_PREFIXES {
        for column in WEATHER_COLUMNS {
            columns.push((format!("{prefix}_{column}"), "REAL"));
        }
        columns.push((format!("{prefix}_conditions"), "TEXT"));
    }
    columns
}

pub struct SqliteOutcomeStore {
    conn: Mutex<Connection>,
}

impl SqliteOutcomeStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&schema_sql())
            .context("failed to initialize database schema")?;
        add_missing_columns(&conn, "history_log", &snapshot_columns())?;
        Ok(SqliteOutcomeStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("outcome store connection lock poisoned"))
    }

    /// Insert a past flight outcome; returns false if (number, date) already exists
    pub fn record_outcome(&self, flight: &HistoricalFlight) -> Result<bool> {
        let mut columns = vec![
            "flight_number".to_string(),
            "flight_date".to_string(),
            "flight_type".to_string(),
            "origin".to_string(),
            "destination".to_string(),
            "is_cancelled".to_string(),
        ];
        let mut values: Vec<Value> = vec![
            Value::Text(flight.flight_number.clone()),
            Value::Text(flight.flight_date.clone()),
            text_or_null(flight.flight_type.map(|t| t.as_str().to_string())),
            text_or_null(flight.origin.clone()),
            text_or_null(flight.destination.clone()),
            Value::Integer(i64::from(flight.is_cancelled)),
        ];

        let readings = [
            &flight.local_weather,
            &flight.origin_weather,
            &flight.destination_weather,
        ];
        for (prefix, reading) in SCOPE_PREFIXES.iter().zip(readings) {
            for (column, value) in WEATHER_COLUMNS.iter().zip(weather_values(reading)) {
                columns.push(format!("{prefix}_{column}"));
                values.push(real_or_null(value));
            }
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT OR IGNORE INTO historical_flights ({}) VALUES ({})",
            columns.join(", "),
            placeholders
        );

        let conn = self.conn()?;
        let inserted = conn
            .execute(&sql, params_from_iter(values))
            .with_context(|| {
                format!(
                    "failed to record outcome for {} on {}",
                    flight.flight_number, flight.flight_date
                )
            })?;
        Ok(inserted > 0)
    }

    /// Log the pre-outcome prediction for a flight with the weather it was
    /// scored on, replacing any earlier one
    pub fn log_prediction(
        &self,
        flight: &FlightContext,
        weather: &AirportWeather,
        risk: &RiskScore,
        logged_at: &str,
    ) -> Result<()> {
        let mut columns: Vec<String> = [
            "flight_id",
            "number",
            "scheduled_time",
            "scheduled_date",
            "predicted_risk",
            "predicted_level",
            "logged_at",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let mut values: Vec<Value> = vec![
            Value::Text(flight.id.clone()),
            text_or_null(flight.number.clone()),
            text_or_null(flight.scheduled_time.clone()),
            text_or_null(flight.scheduled_date()),
            Value::Real(risk.score),
            Value::Text(risk.risk_level.as_str().to_string()),
            Value::Text(logged_at.to_string()),
        ];

        let snapshot = [&weather.local, &weather.origin, &weather.destination]
            .into_iter()
            .flat_map(|reading| snapshot_values(reading.as_ref()));
        for ((column, _), value) in snapshot_columns().into_iter().zip(snapshot) {
            columns.push(column);
            values.push(value);
        }

        // Everything but the key is replaced; status is not in the insert list
        let updates = columns[1..]
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO history_log ({}) VALUES ({})
             ON CONFLICT(flight_id) DO UPDATE SET {}",
            columns.join(", "),
            vec!["?"; columns.len()].join(", "),
            updates
        );

        let conn = self.conn()?;
        conn.execute(&sql, params_from_iter(values))
            .with_context(|| format!("failed to log prediction for flight {}", flight.id))?;
        Ok(())
    }

    /// Weather captured when the flight's prediction was logged
    ///
    /// A scope with no stored value at all reads back as `None`. Cloud cover
    /// and humidity are not part of the snapshot.
    pub fn logged_weather(&self, flight_id: &str) -> Result<Option<AirportWeather>> {
        let columns = snapshot_columns()
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        let sql = format!(
            "SELECT {} FROM history_log WHERE flight_id = ?1",
            columns.join(", ")
        );

        let conn = self.conn()?;
        let weather = conn.query_row(&sql, params![flight_id], |row| {
            let per_scope = WEATHER_COLUMNS.len() + 1;
            let mut scopes = Vec::with_capacity(SCOPE_PREFIXES.len());
            for scope in 0..SCOPE_PREFIXES.len() {
                let base = scope * per_scope;
                let mut numbers = [None; 7];
                for (i, slot) in numbers.iter_mut().enumerate() {
                    *slot = row.get::<_, Option<f64>>(base + i)?;
                }
                let conditions = row.get::<_, Option<String>>(base + WEATHER_COLUMNS.len())?;
                scopes.push(reading_from_snapshot(numbers, conditions));
            }
            let mut scopes = scopes.into_iter();
            Ok(AirportWeather {
                local: scopes.next().flatten(),
                origin: scopes.next().flatten(),
                destination: scopes.next().flatten(),
            })
        })
        .optional()
        .with_context(|| format!("failed to read logged weather for flight {flight_id}"))?;
        Ok(weather)
    }

    /// Attach the observed status to a logged prediction; false if none was logged
    pub fn update_status(&self, flight_id: &str, status: &str) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE history_log SET status = ?1 WHERE flight_id = ?2",
                params![status, flight_id],
            )
            .with_context(|| format!("failed to update status for flight {flight_id}"))?;
        Ok(updated > 0)
    }

    /// The prediction logged for a flight before its outcome was known
    pub fn logged_prediction(&self, flight_id: &str) -> Result<Option<StoredPrediction>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT predicted_risk, predicted_level FROM history_log
                 WHERE flight_id = ?1 AND predicted_risk IS NOT NULL",
                params![flight_id],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()
            .with_context(|| format!("failed to read logged prediction for flight {flight_id}"))?;
        Ok(row.map(|(score, level)| stored_prediction(score, level.as_deref())))
    }

    /// All logged predictions keyed by flight id
    pub fn logged_predictions(&self) -> Result<BTreeMap<String, StoredPrediction>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT flight_id, predicted_risk, predicted_level FROM history_log
                 WHERE predicted_risk IS NOT NULL",
            )
            .context("failed to prepare logged predictions query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .context("failed to query logged predictions")?;

        let mut out = BTreeMap::new();
        for row in rows {
            let (id, score, level) = row.context("failed to read logged prediction row")?;
            out.insert(id, stored_prediction(score, level.as_deref()));
        }
        Ok(out)
    }

    /// Totals over flights dated within `days` of `today` (inclusive)
    pub fn recent_stats(&self, days: u32, today: NaiveDate) -> Result<RecentStats> {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(days)))
            .with_context(|| format!("window of {days} days before {today} is out of range"))?;
        let conn = self.conn()?;
        let (total, cancelled): (i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), SUM(is_cancelled) FROM historical_flights
                 WHERE flight_date >= ?1 AND flight_date <= ?2",
                params![cutoff.format("%Y-%m-%d").to_string(), today.format("%Y-%m-%d").to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("failed to query recent statistics")?;
        let total = to_count(total);
        let cancelled = to_count(cancelled.unwrap_or(0));
        Ok(RecentStats {
            days,
            total,
            cancelled,
            cancellation_rate: percent(cancelled, total),
        })
    }

    /// Per-month totals, most recent month first
    pub fn monthly_statistics(&self) -> Result<Vec<MonthlyStats>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT substr(flight_date, 1, 7) AS month,
                        COUNT(*),
                        SUM(is_cancelled),
                        AVG(local_visibility),
                        AVG(local_wind_speed),
                        AVG(local_temperature)
                 FROM historical_flights
                 GROUP BY month
                 ORDER BY month DESC",
            )
            .context("failed to prepare monthly statistics query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            })
            .context("failed to query monthly statistics")?;

        let mut out = Vec::new();
        for row in rows {
            let (month, total, cancelled, avg_visibility, avg_wind, avg_temp) =
                row.context("failed to read monthly statistics row")?;
            let total = to_count(total);
            let cancelled = to_count(cancelled.unwrap_or(0));
            out.push(MonthlyStats {
                month,
                total,
                cancelled,
                cancellation_rate: percent(cancelled, total),
                avg_visibility,
                avg_wind,
                avg_temp,
            });
        }
        Ok(out)
    }

    pub fn history_range(&self) -> Result<HistoryRange> {
        let conn = self.conn()?;
        let (first_date, last_date, total): (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(flight_date), MAX(flight_date), COUNT(*) FROM historical_flights",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .context("failed to query history range")?;

        let days_covered = match (first_date.as_deref(), last_date.as_deref()) {
            (Some(first), Some(last)) => {
                let first = NaiveDate::parse_from_str(first, "%Y-%m-%d").ok();
                let last = NaiveDate::parse_from_str(last, "%Y-%m-%d").ok();
                match (first, last) {
                    (Some(f), Some(l)) => (l - f).num_days() + 1,
                    _ => 0,
                }
            }
            _ => 0,
        };

        Ok(HistoryRange {
            first_date,
            last_date,
            total: to_count(total),
            days_covered,
        })
    }
}

impl OutcomeStore for SqliteOutcomeStore {
    fn find_analogs(&self, filter: &AnalogFilter) -> Result<AnalogCounts> {
        let mut sql =
            String::from("SELECT COUNT(*), SUM(is_cancelled) FROM historical_flights WHERE 1=1");
        let mut values: Vec<Value> = Vec::new();

        if let Some(flight_type) = filter.flight_type {
            sql.push_str(" AND flight_type = ?");
            values.push(Value::Text(flight_type.as_str().to_string()));
        }
        for clause in &filter.clauses {
            sql.push_str(&format!(
                " AND {} {} ?",
                column_expr(clause.scope, clause.field),
                clause.cmp.operator()
            ));
            values.push(Value::Real(clause.cmp.value()));
        }

        let conn = self.conn()?;
        let (total, cancelled): (i64, Option<i64>) = conn
            .query_row(&sql, params_from_iter(values), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .with_context(|| format!("analog query failed: {}", filter.describe()))?;

        Ok(AnalogCounts::new(
            to_count(total),
            to_count(cancelled.unwrap_or(0)),
        ))
    }

    fn calibration_inputs(&self) -> Result<Vec<CalibrationSample>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT h.predicted_risk, f.is_cancelled
                 FROM history_log h
                 JOIN historical_flights f
                   ON f.flight_number = h.number AND f.flight_date = h.scheduled_date
                 WHERE h.predicted_risk IS NOT NULL
                 ORDER BY h.flight_id",
            )
            .context("failed to prepare calibration query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CalibrationSample {
                    predicted_score: row.get(0)?,
                    cancelled: row.get::<_, i64>(1)? != 0,
                })
            })
            .context("failed to query calibration inputs")?;

        let samples = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read calibration row")?;
        Ok(samples)
    }
}

fn schema_sql() -> String {
    let mut weather_columns = String::new();
    for prefix in SCOPE_PREFIXES {
        for column in WEATHER_COLUMNS {
            weather_columns.push_str(&format!(",\n    {prefix}_{column} REAL"));
        }
    }
    let snapshot_columns: String = snapshot_columns()
        .iter()
        .map(|(name, sql_type)| format!(",\n    {name} {sql_type}"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS historical_flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_number TEXT NOT NULL,
    flight_date TEXT NOT NULL,
    flight_type TEXT,
    origin TEXT,
    destination TEXT,
    is_cancelled INTEGER NOT NULL DEFAULT 0{weather_columns},
    UNIQUE (flight_number, flight_date)
);
CREATE INDEX IF NOT EXISTS idx_local_weather
    ON historical_flights (local_visibility, local_wind_speed);
CREATE TABLE IF NOT EXISTS history_log (
    flight_id TEXT PRIMARY KEY,
    number TEXT,
    scheduled_time TEXT,
    scheduled_date TEXT,
    status TEXT,
    predicted_risk REAL,
    predicted_level TEXT,
    logged_at TEXT{snapshot_columns}
);"
    )
}

/// Bring a table created by an older schema up to date
fn add_missing_columns(
    conn: &Connection,
    table: &str,
    columns: &[(String, &'static str)],
) -> Result<()> {
    let existing: HashSet<String> = {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .with_context(|| format!("failed to inspect table {table}"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .with_context(|| format!("failed to list columns of {table}"))?;
        names
            .collect::<rusqlite::Result<_>>()
            .with_context(|| format!("failed to read columns of {table}"))?
    };

    for (name, sql_type) in columns {
        if !existing.contains(name) {
            tracing::debug!(table, column = %name, "adding missing column");
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {name} {sql_type}"))
                .with_context(|| format!("failed to add column {name} to {table}"))?;
        }
    }
    Ok(())
}

/// SQL expression for a stored field in a scope
fn column_expr(scope: AirportScope, field: StoredField) -> String {
    let prefix = match scope {
        AirportScope::Local => "local",
        AirportScope::Origin => "origin",
        AirportScope::Destination => "dest",
    };
    match field {
        StoredField::Visibility => format!("{prefix}_visibility"),
        StoredField::EffectiveWind => format!("COALESCE({prefix}_wind_gust, {prefix}_wind_speed)"),
        StoredField::SnowDepth => format!("{prefix}_snow_depth"),
        StoredField::Precipitation => format!("{prefix}_precipitation"),
        StoredField::Temperature => format!("{prefix}_temperature"),
    }
}

fn weather_values(reading: &WeatherReading) -> [Option<f64>; 7] {
    [
        reading.visibility_miles,
        reading.wind_speed_knots,
        reading.wind_gust_knots,
        reading.wind_direction,
        reading.temperature_f,
        reading.precipitation_in,
        reading.snow_depth_in,
    ]
}

fn snapshot_values(reading: Option<&WeatherReading>) -> Vec<Value> {
    let numbers = reading.map(weather_values).unwrap_or([None; 7]);
    let mut values: Vec<Value> = numbers.into_iter().map(real_or_null).collect();
    values.push(text_or_null(reading.and_then(|r| r.conditions.clone())));
    values
}

fn reading_from_snapshot(
    numbers: [Option<f64>; 7],
    conditions: Option<String>,
) -> Option<WeatherReading> {
    if numbers.iter().all(Option::is_none) && conditions.is_none() {
        return None;
    }
    let [visibility_miles, wind_speed_knots, wind_gust_knots, wind_direction, temperature_f, precipitation_in, snow_depth_in] =
        numbers;
    Some(WeatherReading {
        visibility_miles,
        wind_speed_knots,
        wind_gust_knots,
        wind_direction,
        temperature_f,
        precipitation_in,
        snow_depth_in,
        conditions,
        ..Default::default()
    })
}

fn real_or_null(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

fn text_or_null(v: Option<String>) -> Value {
    v.map(Value::Text).unwrap_or(Value::Null)
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn stored_prediction(score: f64, level: Option<&str>) -> StoredPrediction {
    StoredPrediction {
        score,
        level: level
            .and_then(RiskLevel::parse)
            .unwrap_or_else(|| assign_risk_level(score)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analogs::{local_filter, remote_filter, Fingerprint};
    use crate::flight::FlightType;

    fn outcome(number: &str, date: &str, vis: f64, cancelled: bool) -> HistoricalFlight {
        HistoricalFlight {
            flight_number: number.to_string(),
            flight_date: date.to_string(),
            flight_type: Some(FlightType::Arrival),
            origin: Some("SEA".to_string()),
            destination: Some("PUW".to_string()),
            is_cancelled: cancelled,
            local_weather: WeatherReading {
                visibility_miles: Some(vis),
                wind_speed_knots: Some(10.0),
                ..Default::default()
            },
            origin_weather: WeatherReading::default(),
            destination_weather: WeatherReading::default(),
        }
    }

    #[test]
    fn test_record_outcome_deduplicates() {
        let store = SqliteOutcomeStore::open_in_memory().unwrap();
        assert!(store.record_outcome(&outcome("AS2156", "2025-01-05", 1.0, true)).unwrap());
        assert!(!store.record_outcome(&outcome("AS2156", "2025-01-05", 9.0, false)).unwrap());
        assert!(store.record_outcome(&outcome("AS2156", "2025-01-06", 1.0, false)).unwrap());
        assert_eq!(store.history_range().unwrap().total, 2);
    }

    #[test]
    fn test_find_analogs_counts_in_sql() {
        let store = SqliteOutcomeStore::open_in_memory().unwrap();
        store.record_outcome(&outcome("A1", "2025-01-01", 0.5, true)).unwrap();
        store.record_outcome(&outcome("A2", "2025-01-02", 1.0, false)).unwrap();
        store.record_outcome(&outcome("A3", "2025-01-03", 5.0, false)).unwrap();

        let counts = store
            .find_analogs(&local_filter(&Fingerprint::visibility_only(0.8)))
            .unwrap();
        assert_eq!(counts, AnalogCounts::new(2, 1));
    }

    #[test]
    fn test_empty_table_counts_zero() {
        let store = SqliteOutcomeStore::open_in_memory().unwrap();
        let counts = store.find_analogs(&AnalogFilter::default()).unwrap();
        assert_eq!(counts, AnalogCounts::new(0, 0));
    }

    #[test]
    fn test_null_columns_never_match() {
        let store = SqliteOutcomeStore::open_in_memory().unwrap();
        store.record_outcome(&outcome("A1", "2025-01-01", 0.5, true)).unwrap();
        // Origin weather was never recorded
        let filter = remote_filter(
            &Fingerprint::visibility_only(0.5),
            AirportScope::Origin,
            FlightType::Arrival,
        );
        assert_eq!(store.find_analogs(&filter).unwrap().total, 0);
    }

    #[test]
    fn test_effective_wind_uses_gust() {
        let store = SqliteOutcomeStore::open_in_memory().unwrap();
        let mut gusty = outcome("A1", "2025-01-01", 9.0, true);
        gusty.local_weather.wind_gust_knots = Some(35.0);
        store.record_outcome(&gusty).unwrap();
        store.record_outcome(&outcome("A2", "2025-01-02", 9.0, false)).unwrap();

        let counts = store
            .find_analogs(&local_filter(&Fingerprint::wind_only(30.0)))
            .unwrap();
        assert_eq!(counts, AnalogCounts::new(1, 1));
    }
}
