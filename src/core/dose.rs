//! Conversion of windowed pulse counts into CPM and dose rate.
//!
//! Everything here is a pure function of the pulse total and the window
//! length. An empty window yields zero rather than a division fault.

use serde::{Deserialize, Serialize};

/// Sensor calibration: CPM per µSv/h for the Type 5 Geiger sensor.
pub const DEFAULT_ALPHA: f64 = 53.032;

/// One dose estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DoseRate {
    /// Counts per minute
    pub cpm: f64,
    /// Dose rate in µSv/h
    pub usvh: f64,
    /// One-sigma Poisson error of the dose rate in µSv/h
    pub usvh_error: f64,
}

/// CPM to dose-rate converter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseEstimator {
    alpha: f64,
}

impl DoseEstimator {
    /// Create an estimator with the given CPM-per-µSv/h factor.
    ///
    /// Non-positive or non-finite factors fall back to [`DEFAULT_ALPHA`].
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha
        } else {
            tracing::warn!(
                alpha,
                default = DEFAULT_ALPHA,
                "invalid calibration factor, using default"
            );
            DEFAULT_ALPHA
        };
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn cpm(&self, count: u64, window_minutes: f64) -> f64 {
        if window_minutes > 0.0 {
            count as f64 / window_minutes
        } else {
            0.0
        }
    }

    pub fn usvh(&self, count: u64, window_minutes: f64) -> f64 {
        self.cpm(count, window_minutes) / self.alpha
    }

    /// √N counting error carried through the same normalisation as the rate.
    pub fn usvh_error(&self, count: u64, window_minutes: f64) -> f64 {
        if window_minutes > 0.0 {
            (count as f64).sqrt() / window_minutes / self.alpha
        } else {
            0.0
        }
    }

    pub fn estimate(&self, count: u64, window_minutes: f64) -> DoseRate {
        DoseRate {
            cpm: self.cpm(count, window_minutes),
            usvh: self.usvh(count, window_minutes),
            usvh_error: self.usvh_error(count, window_minutes),
        }
    }
}

impl Default for DoseEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}
