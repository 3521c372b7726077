//! Risk report rendering
//!
//! Text and JSON output for scored flights. Output is deterministic:
//! flights appear in input order and factors in evaluation order.

use crate::flight::FlightContext;
use crate::risk::RiskScore;
use crate::store::{HistoryRange, MonthlyStats, RecentStats};
use serde::{Deserialize, Serialize};

/// A flight paired with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFlight {
    pub flight: FlightContext,
    pub risk: RiskScore,
}

/// Render scored flights as a text table with indented factors
pub fn render_text(flights: &[ScoredFlight]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<7} {:<7} {:<12} {:<10} {:<9} {:<25} {}\n",
        "SCORE", "LEVEL", "FLIGHT", "TYPE", "ROUTE", "SCHEDULED", "CAL"
    ));

    for scored in flights {
        let flight = &scored.flight;
        let risk = &scored.risk;
        let label = flight.number.as_deref().unwrap_or(&flight.id);
        output.push_str(&format!(
            "{:<7} {:<7} {:<12} {:<10} {:<9} {:<25} x{:.2}\n",
            format!("{:.1}", risk.score),
            risk.risk_level.as_str(),
            truncate_or_pad(label, 12),
            flight.flight_type.as_str(),
            format!("{}-{}", flight.origin, flight.destination),
            flight.scheduled_time.as_deref().unwrap_or("-"),
            risk.breakdown.calibration_factor,
        ));
        for factor in &risk.factors {
            output.push_str(&format!("        - {}\n", factor));
        }
    }

    output
}

/// Render scored flights as JSON output
pub fn render_json(flights: &[ScoredFlight]) -> String {
    serde_json::to_string_pretty(flights).unwrap_or_else(|_| "[]".to_string())
}

/// Outcome statistics bundle for `stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub range: HistoryRange,
    pub recent: RecentStats,
    pub monthly: Vec<MonthlyStats>,
}

pub fn render_stats_text(stats: &HistoryStats) -> String {
    let mut output = String::new();

    match (&stats.range.first_date, &stats.range.last_date) {
        (Some(first), Some(last)) => output.push_str(&format!(
            "History: {} flights, {} to {} ({} days)\n",
            stats.range.total, first, last, stats.range.days_covered
        )),
        _ => output.push_str("History: no recorded flights\n"),
    }
    output.push_str(&format!(
        "Last {} days: {} flights, {} cancelled ({:.1}%)\n\n",
        stats.recent.days,
        stats.recent.total,
        stats.recent.cancelled,
        stats.recent.cancellation_rate
    ));

    output.push_str(&format!(
        "{:<8} {:>7} {:>9} {:>7} {:>8} {:>8} {:>8}\n",
        "MONTH", "FLIGHTS", "CANCELLED", "RATE", "AVG VIS", "AVG WIND", "AVG TEMP"
    ));
    for m in &stats.monthly {
        output.push_str(&format!(
            "{:<8} {:>7} {:>9} {:>6.1}% {:>8} {:>8} {:>8}\n",
            m.month,
            m.total,
            m.cancelled,
            m.cancellation_rate,
            fmt_opt(m.avg_visibility),
            fmt_opt(m.avg_wind),
            fmt_opt(m.avg_temp),
        ));
    }

    output
}

pub fn render_stats_json(stats: &HistoryStats) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string())
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        format!("{:<width$}", s, width = width)
    }
}
