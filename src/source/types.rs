//! Pulse event types shared between the sources and the polling side.
//!
//! These types carry ONLY which line fired and when - the count itself lives in
//! the edge counters, never in the events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the sensor's two output lines produced a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseKind {
    /// A detected radiation event
    Radiation,
    /// Electrical noise (vibration, interference) picked up by the sensor
    Noise,
}

impl PulseKind {
    pub fn label(self) -> &'static str {
        match self {
            PulseKind::Radiation => "radiation",
            PulseKind::Noise => "noise",
        }
    }
}

impl std::fmt::Display for PulseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Notification that at least one pulse of a kind occurred during a polling cycle.
///
/// Handlers observe coalesced events: one notification per cycle, not per pulse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorEvent {
    /// When the polling cycle dispatched the notification
    pub timestamp: DateTime<Utc>,
    /// Which line fired
    pub kind: PulseKind,
}

impl SensorEvent {
    pub fn new(kind: PulseKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn is_noise(&self) -> bool {
        self.kind == PulseKind::Noise
    }
}
