//! Session measurement statistics.
//!
//! Tracks how many cycles ran, how many were thrown away for noise and how
//! many pulses went each way, so the effect of noise gating on a reading can be
//! judged after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::source::CycleSample;

/// Counters for the current measurement session.
#[derive(Debug)]
pub struct MeasurementLog {
    /// Polling cycles that drained the pulse lines
    cycles: AtomicU64,
    /// Cycles discarded because noise was present
    noisy_cycles: AtomicU64,
    /// Radiation pulses added to the window
    radiation_counted: AtomicU64,
    /// Radiation pulses drained during noisy cycles
    radiation_discarded: AtomicU64,
    /// Noise pulses drained
    noise_pulses: AtomicU64,
    /// Handler invocations
    events_dispatched: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            noisy_cycles: AtomicU64::new(0),
            radiation_counted: AtomicU64::new(0),
            radiation_discarded: AtomicU64::new(0),
            noise_pulses: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record one drained cycle.
    pub fn record_cycle(&self, sample: &CycleSample, counted: bool) {
        let radiation = u64::from(sample.radiation.count);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.noise_pulses
            .fetch_add(u64::from(sample.noise.count), Ordering::Relaxed);
        if counted {
            self.radiation_counted
                .fetch_add(radiation, Ordering::Relaxed);
        } else {
            self.noisy_cycles.fetch_add(1, Ordering::Relaxed);
            self.radiation_discarded
                .fetch_add(radiation, Ordering::Relaxed);
        }
    }

    /// Record a handler invocation.
    pub fn record_event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MeasurementStats {
        MeasurementStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            noisy_cycles: self.noisy_cycles.load(Ordering::Relaxed),
            radiation_counted: self.radiation_counted.load(Ordering::Relaxed),
            radiation_discarded: self.radiation_discarded.load(Ordering::Relaxed),
            noise_pulses: self.noise_pulses.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: u64::try_from((Utc::now() - self.session_start).num_seconds())
                .unwrap_or(0),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Polling cycles: {}\n\
             - Cycles discarded for noise: {} ({:.1}%)\n\
             - Radiation pulses counted: {}\n\
             - Radiation pulses discarded: {}\n\
             - Noise pulses: {}\n\
             - Session duration: {} seconds",
            stats.cycles,
            stats.noisy_cycles,
            stats.noisy_ratio() * 100.0,
            stats.radiation_counted,
            stats.radiation_discarded,
            stats.noise_pulses,
            stats.session_duration_secs
        )
    }

}

impl Default for MeasurementLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of measurement statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementStats {
    pub cycles: u64,
    pub noisy_cycles: u64,
    pub radiation_counted: u64,
    pub radiation_discarded: u64,
    pub noise_pulses: u64,
    pub events_dispatched: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl MeasurementStats {
    /// Fraction of cycles discarded for noise.
    pub fn noisy_ratio(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.noisy_cycles as f64 / self.cycles as f64
        }
    }
}

/// Thread-safe shared measurement log.
pub type SharedMeasurementLog = Arc<MeasurementLog>;

/// Create a new shared measurement log.
pub fn create_shared_log() -> SharedMeasurementLog {
    Arc::new(MeasurementLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DrainedPulses;

    fn sample(radiation: u32, noise: u32) -> CycleSample {
        CycleSample {
            radiation: DrainedPulses {
                count: radiation,
                event: radiation > 0,
            },
            noise: DrainedPulses {
                count: noise,
                event: noise > 0,
            },
        }
    }

    #[test]
    fn test_counts_split_by_noise_gate() {
        let log = MeasurementLog::new();
        log.record_cycle(&sample(3, 0), true);
        log.record_cycle(&sample(2, 1), false);
        log.record_cycle(&sample(0, 0), true);

        let stats = log.stats();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.noisy_cycles, 1);
        assert_eq!(stats.radiation_counted, 3);
        assert_eq!(stats.radiation_discarded, 2);
        assert_eq!(stats.noise_pulses, 1);
        assert!((stats.noisy_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_log_ratio_is_zero() {
        let log = MeasurementLog::new();
        let stats = log.stats();
        assert_eq!(stats.cycles, 0);
        assert_eq!(stats.events_dispatched, 0);
        assert!(stats.noisy_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_format() {
        let log = MeasurementLog::new();
        let summary = log.summary();

        assert!(summary.contains("Polling cycles"));
        assert!(summary.contains("discarded for noise"));
        assert!(summary.contains("Noise pulses"));
    }
}
