//! Calibration against logged prediction accuracy
//!
//! One multiplicative factor, learned from how often past predictions were
//! followed by a cancellation, scales every raw score an engine produces.

use crate::risk::CALIBRATED_SCORE_CAP;
use serde::{Deserialize, Serialize};

/// Matched samples required before the learned factor is trusted
pub const MIN_SAMPLES: usize = 30;

/// Factor used with too little history (or when history is unreadable)
pub const DEFAULT_FACTOR: f64 = 0.5;

/// Factor used when history exists but nothing was ever cancelled
pub const NO_CANCELLATION_FACTOR: f64 = 0.3;

pub const MIN_FACTOR: f64 = 0.1;
pub const MAX_FACTOR: f64 = 2.0;

/// Ideal factors below this are pulled halfway back toward it
const DAMPING_PIVOT: f64 = 0.5;

/// One logged prediction joined against its recorded outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub predicted_score: f64,
    pub cancelled: bool,
}

/// Factor plus the sample it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub factor: f64,
    pub samples: usize,
    pub cancellations: usize,
    /// Undamped, unclamped ratio; absent when a default was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal: Option<f64>,
}

impl Calibration {
    /// Fixed factor, e.g. for tests or an unreadable log
    pub fn fixed(factor: f64) -> Self {
        Calibration {
            factor: factor.clamp(MIN_FACTOR, MAX_FACTOR),
            samples: 0,
            cancellations: 0,
            ideal: None,
        }
    }

    /// Learn the factor from matched samples
    pub fn from_samples(samples: &[CalibrationSample]) -> Self {
        let n = samples.len();
        let cancellations = samples.iter().filter(|s| s.cancelled).count();

        if n < MIN_SAMPLES {
            return Calibration {
                factor: DEFAULT_FACTOR,
                samples: n,
                cancellations,
                ideal: None,
            };
        }
        if cancellations == 0 {
            return Calibration {
                factor: NO_CANCELLATION_FACTOR,
                samples: n,
                cancellations,
                ideal: None,
            };
        }

        let actual_rate = cancellations as f64 / n as f64 * 100.0;
        let avg_predicted = samples.iter().map(|s| s.predicted_score).sum::<f64>() / n as f64;
        let ideal = if avg_predicted > 0.0 {
            actual_rate / avg_predicted
        } else {
            MAX_FACTOR
        };

        Calibration {
            factor: damp(ideal.clamp(MIN_FACTOR, MAX_FACTOR)),
            samples: n,
            cancellations,
            ideal: Some(ideal),
        }
    }

    /// Scale a capped raw score, re-clamped to [0, 100]
    pub fn apply(&self, raw: f64) -> f64 {
        (raw * self.factor).clamp(0.0, CALIBRATED_SCORE_CAP)
    }
}

fn damp(factor: f64) -> f64 {
    if factor < DAMPING_PIVOT {
        DAMPING_PIVOT + (factor - DAMPING_PIVOT) * 0.5
    } else {
        factor
    }
}
