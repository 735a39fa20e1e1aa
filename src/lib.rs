//! Geiger Dose Agent - dose-rate estimation from a two-line pulse Geiger sensor.
//!
//! The sensor raises one line for every detected radiation event and another
//! for electrical noise (vibration, interference). This library counts both,
//! turns the radiation counts into counts per minute over a sliding window, and
//! converts that to a dose rate in µSv/h with its Poisson error.
//!
//! # Measurement guarantees
//!
//! - **No lost pulses**: edges are counted atomically and drained with edge
//!   delivery masked, so an edge is either in this cycle or the next one
//! - **Noise gating**: an interval with any noise pulse is dropped entirely,
//!   from both the count and the time it is normalised by
//! - **Bounded memory**: the window is a fixed ring of 6-second buckets
//! - **Total estimator**: an empty window reads as zero, never as an error
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Geiger Dose Agent                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Source    │──▶│ Pulse lines │──▶│   Polling   │        │
//! │  │ (edges)     │   │ (counters)  │   │   cycle     │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                        │        │           │
//! │                                        ▼        ▼           │
//! │                              ┌─────────────┐ ┌──────────┐   │
//! │                              │  Window     │ │ Handlers │   │
//! │                              │ (6s ring)   │ └──────────┘   │
//! │                              └─────────────┘                │
//! │                                     │                       │
//! │                                     ▼                       │
//! │                              ┌─────────────┐                │
//! │                              │    Dose     │                │
//! │                              │  estimate   │                │
//! │                              └─────────────┘                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use geiger_dose_agent::{GeigerMonitor, MonitorConfig};
//!
//! let mut monitor = GeigerMonitor::new(MonitorConfig::default());
//! let lines = monitor.lines();
//!
//! // From the edge side (interrupt handler, source thread):
//! lines.on_radiation();
//!
//! // From the host loop, as often as possible:
//! monitor.tick();
//! println!("{}", monitor.csv_status());
//! ```

pub mod config;
pub mod core;
pub mod source;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, OutputFormat, SourceConfig, SourceKind};
pub use crate::core::{
    CycleOutcome, DoseEstimator, DoseRate, DoseReading, GeigerMonitor, MonitorConfig,
    WindowedRateAccumulator,
};
pub use source::{PulseKind, PulseLines, PulseSource, SensorEvent, SourceError};
pub use telemetry::{MeasurementLog, MeasurementStats, SharedMeasurementLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
