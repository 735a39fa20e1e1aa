//! Telemetry for the Geiger dose agent.
//!
//! Session statistics describing what the polling cycle saw and discarded.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, MeasurementLog, MeasurementStats, SharedMeasurementLog};
