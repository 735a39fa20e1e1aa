//! Reading snapshots and the line-oriented output surface.
//!
//! The CSV header and status line keep the field order and three-decimal
//! precision existing consumers of the sensor's serial output parse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::dose::DoseRate;

/// CSV header naming the status line fields.
pub const CSV_KEYS: &str = "time(ms),count,cpm,uSv/h,uSv/hError";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "geiger-dose-agent";

/// A point-in-time dose reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseReading {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Producer that generated the reading
    pub producer: String,
    /// Measurement session this reading belongs to
    pub session_id: String,
    /// Measured time (noisy intervals excluded), in milliseconds
    pub duration_ms: u64,
    /// Radiation pulses drained in the most recent cycle
    pub count: u32,
    /// Pulses inside the current window
    pub window_count: u64,
    /// Window length the rate is normalised by, in minutes
    pub window_minutes: f64,
    /// Counts per minute
    pub cpm: f64,
    /// Dose rate in µSv/h
    #[serde(rename = "usv_h")]
    pub usvh: f64,
    /// Poisson error of the dose rate in µSv/h
    #[serde(rename = "usv_h_error")]
    pub usvh_error: f64,
}

impl DoseReading {
    /// Format as one CSV status line matching [`CSV_KEYS`].
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{:.3},{:.3},{:.3}",
            self.duration_ms, self.count, self.cpm, self.usvh, self.usvh_error
        )
    }
}

/// Builds readings stamped with one session identity.
#[derive(Debug, Clone)]
pub struct ReadingBuilder {
    session_id: Uuid,
}

/// Raw figures a reading is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingInput {
    pub duration_ms: u64,
    pub count: u32,
    pub window_count: u64,
    pub window_minutes: f64,
    pub dose: DoseRate,
}

impl ReadingBuilder {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> String {
        self.session_id.to_string()
    }

    pub fn build(&self, input: ReadingInput) -> DoseReading {
        DoseReading {
            timestamp: Utc::now(),
            producer: PRODUCER_NAME.to_string(),
            session_id: self.session_id(),
            duration_ms: input.duration_ms,
            count: input.count,
            window_count: input.window_count,
            window_minutes: input.window_minutes,
            cpm: input.dose.cpm,
            usvh: input.dose.usvh,
            usvh_error: input.dose.usvh_error,
        }
    }
}

impl Default for ReadingBuilder {
    fn default() -> Self {
        Self::new()
    }
}
