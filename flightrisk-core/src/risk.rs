//! Risk score value object and level assignment
//!
//! Global invariants enforced:
//! - `factors` and `detailed_factors` have identical length and order
//! - Breakdown partial sums add up to the stage they summarize
//! - Risk level is assigned from the calibrated score only

use serde::{Deserialize, Serialize};

/// Upper bound applied by the blender before calibration
pub const RAW_SCORE_CAP: f64 = 99.0;

/// Upper bound applied after calibration
pub const CALIBRATED_SCORE_CAP: f64 = 100.0;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,    // < 40
    Medium, // 40-69
    High,   // >= 70
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Parse a stored level label (case-insensitive)
    pub fn parse(label: &str) -> Option<RiskLevel> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Scores at or above this are Medium
pub const MEDIUM_THRESHOLD: f64 = 40.0;

/// Scores at or above this are High
pub const HIGH_THRESHOLD: f64 = 70.0;

pub fn assign_risk_level(score: f64) -> RiskLevel {
    if score >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Category of a contributing factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorCategory {
    Seasonal,
    Weather,
    Origin,
    Destination,
    History,
}

/// Structured counterpart of one human-readable factor line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Factor {
    pub category: FactorCategory,
    pub description: String,
    pub details: serde_json::Value,
}

impl Factor {
    pub fn new(
        category: FactorCategory,
        description: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Factor {
            category,
            description: description.into(),
            details,
        }
    }
}

/// Named partial sums of the score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Breakdown {
    pub seasonal_baseline: f64,
    /// Local airport weather contribution
    pub weather_score: f64,
    /// Weighted origin contribution (arrivals, multi-airport path)
    pub origin_weather: f64,
    /// Weighted destination contribution (departures, multi-airport path)
    pub destination_weather: f64,
    pub history_adjustment: f64,
    /// Amount removed (negative) or added by the [0, 99] cap
    pub cap_adjustment: f64,
    /// Raw score after the cap, before calibration
    pub final_score: f64,
    pub calibration_factor: f64,
    pub calibrated_score: f64,
    pub calibration_delta: f64,
}

impl Breakdown {
    /// Sum of the pre-cap components plus the cap adjustment
    pub fn component_sum(&self) -> f64 {
        self.seasonal_baseline
            + self.weather_score
            + self.origin_weather
            + self.destination_weather
            + self.history_adjustment
            + self.cap_adjustment
    }
}

/// Final output of one risk calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskScore {
    /// Calibrated score, 0-100
    pub score: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
    pub detailed_factors: Vec<Factor>,
    pub breakdown: Breakdown,
}

impl RiskScore {
    /// Build from the blended factors; `factors` is derived from `detailed_factors`.
    pub fn new(detailed_factors: Vec<Factor>, breakdown: Breakdown) -> Self {
        let score = breakdown.calibrated_score;
        RiskScore {
            score,
            risk_level: assign_risk_level(score),
            factors: detailed_factors
                .iter()
                .map(|f| f.description.clone())
                .collect(),
            detailed_factors,
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(assign_risk_level(0.0), RiskLevel::Low);
        assert_eq!(assign_risk_level(39.99), RiskLevel::Low);
        assert_eq!(assign_risk_level(40.0), RiskLevel::Medium);
        assert_eq!(assign_risk_level(69.99), RiskLevel::Medium);
        assert_eq!(assign_risk_level(70.0), RiskLevel::High);
        assert_eq!(assign_risk_level(100.0), RiskLevel::High);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse(" medium "), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("severe"), None);
    }

    #[test]
    fn test_factor_lists_stay_aligned() {
        let detailed = vec![
            Factor::new(FactorCategory::Weather, "Low Visibility (0.8mi)", serde_json::json!({})),
            Factor::new(FactorCategory::History, "History: 40% cancelled", serde_json::json!({})),
        ];
        let breakdown = Breakdown {
            calibrated_score: 55.0,
            ..Default::default()
        };
        let risk = RiskScore::new(detailed, breakdown);
        assert_eq!(risk.factors.len(), risk.detailed_factors.len());
        for (line, detail) in risk.factors.iter().zip(&risk.detailed_factors) {
            assert_eq!(line, &detail.description);
        }
        assert_eq!(risk.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_level_serializes_capitalized() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, r#""High""#);
    }
}
