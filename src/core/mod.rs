//! Core functionality for the Geiger dose agent.
//!
//! This module contains:
//! - The sliding window that turns drained pulse counts into a windowed total
//! - Dose estimation from that total
//! - The polling cycle tying the pulse lines, window and handlers together
//! - Reading snapshots for output

pub mod callbacks;
pub mod clock;
pub mod dose;
pub mod monitor;
pub mod reading;
pub mod windowing;

// Re-export commonly used types
pub use callbacks::{CallbackRegistry, Handler};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dose::{DoseEstimator, DoseRate, DEFAULT_ALPHA};
pub use monitor::{CycleOutcome, GeigerMonitor, MonitorConfig, DEFAULT_POLL_THRESHOLD_MS};
pub use reading::{DoseReading, ReadingBuilder, ReadingInput, CSV_KEYS, PRODUCER_NAME};
pub use windowing::{
    ElapsedTimeTracker, WindowedRateAccumulator, BUCKET_SECONDS, DEFAULT_HISTORY_SIZE,
    MAX_HISTORY_SIZE,
};
