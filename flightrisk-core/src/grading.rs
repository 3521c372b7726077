//! Retrospective grading of logged predictions

use crate::risk::RiskLevel;
use serde::{Deserialize, Serialize};

/// Scores at or above this count as a confident "will cancel"
pub const CONFIDENT_CANCEL: f64 = 70.0;

/// Scores below this count as a confident "will operate"
pub const CONFIDENT_OPERATE: f64 = 40.0;

/// Prediction as logged before the outcome was known
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub score: f64,
    pub level: RiskLevel,
}

/// What actually happened to the flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Cancelled,
    Completed,
}

impl Outcome {
    /// Normalize a flight status; statuses that are not final yield `None`
    pub fn from_status(status: &str) -> Option<Outcome> {
        match status.trim().to_ascii_lowercase().as_str() {
            "cancelled" | "canceled" => Some(Outcome::Cancelled),
            "landed" | "arrived" | "departed" => Some(Outcome::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "Nailed It")]
    NailedIt,
    Miss,
    Neutral,
    Smooth,
    #[serde(rename = "False Alarm")]
    FalseAlarm,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::NailedIt => "Nailed It",
            Grade::Miss => "Miss",
            Grade::Neutral => "Neutral",
            Grade::Smooth => "Smooth",
            Grade::FalseAlarm => "False Alarm",
        }
    }
}

/// Grade a stored prediction against the outcome. Never rescoring: only the
/// logged score is consulted.
pub fn grade(prediction: &StoredPrediction, outcome: Outcome) -> Grade {
    let score = prediction.score;
    match outcome {
        Outcome::Cancelled if score >= CONFIDENT_CANCEL => Grade::NailedIt,
        Outcome::Cancelled if score < CONFIDENT_OPERATE => Grade::Miss,
        Outcome::Completed if score < CONFIDENT_OPERATE => Grade::Smooth,
        Outcome::Completed if score >= CONFIDENT_CANCEL => Grade::FalseAlarm,
        _ => Grade::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::assign_risk_level;

    fn stored(score: f64) -> StoredPrediction {
        StoredPrediction {
            score,
            level: assign_risk_level(score),
        }
    }

    #[test]
    fn test_grading_table() {
        assert_eq!(grade(&stored(75.0), Outcome::Cancelled), Grade::NailedIt);
        assert_eq!(grade(&stored(30.0), Outcome::Cancelled), Grade::Miss);
        assert_eq!(grade(&stored(50.0), Outcome::Cancelled), Grade::Neutral);
        assert_eq!(grade(&stored(20.0), Outcome::Completed), Grade::Smooth);
        assert_eq!(grade(&stored(80.0), Outcome::Completed), Grade::FalseAlarm);
        assert_eq!(grade(&stored(55.0), Outcome::Completed), Grade::Neutral);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(grade(&stored(70.0), Outcome::Cancelled), Grade::NailedIt);
        assert_eq!(grade(&stored(40.0), Outcome::Cancelled), Grade::Neutral);
        assert_eq!(grade(&stored(40.0), Outcome::Completed), Grade::Neutral);
        assert_eq!(grade(&stored(70.0), Outcome::Completed), Grade::FalseAlarm);
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(Outcome::from_status("Canceled"), Some(Outcome::Cancelled));
        assert_eq!(Outcome::from_status("cancelled"), Some(Outcome::Cancelled));
        assert_eq!(Outcome::from_status("Landed"), Some(Outcome::Completed));
        assert_eq!(Outcome::from_status("departed"), Some(Outcome::Completed));
        assert_eq!(Outcome::from_status("Scheduled"), None);
        assert_eq!(Outcome::from_status("Delayed"), None);
    }

    #[test]
    fn test_grade_labels() {
        assert_eq!(Grade::FalseAlarm.as_str(), "False Alarm");
        assert_eq!(serde_json::to_string(&Grade::NailedIt).unwrap(), r#""Nailed It""#);
    }
}
