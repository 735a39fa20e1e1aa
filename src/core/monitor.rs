//! The polling cycle and the monitor's host-facing surface.
//!
//! [`GeigerMonitor::tick`] is meant to be called far more often than the poll
//! threshold. Most calls only accumulate loop time and return. Once more than
//! the threshold has accumulated, one cycle runs to completion:
//!
//! 1. **Drain** both pulse lines with edge delivery masked.
//! 2. **Evaluate** the noise gate. A cycle with any noise pulse is discarded
//!    whole: neither its radiation count nor its duration reaches the window.
//!    A clean cycle advances the window and adds its duration to measured time.
//! 3. **Dispatch** the radiation and noise handlers, each at most once.
//!
//! Readings are pulled on demand from the window's current state.

use crate::core::callbacks::{CallbackRegistry, Handler};
use crate::core::clock::{Clock, MonotonicClock};
use crate::core::dose::{DoseEstimator, DoseRate, DEFAULT_ALPHA};
use crate::core::reading::{DoseReading, ReadingBuilder, ReadingInput, CSV_KEYS};
use crate::core::windowing::{ElapsedTimeTracker, WindowedRateAccumulator, DEFAULT_HISTORY_SIZE};
use crate::source::{CycleSample, PulseKind, PulseLines, SharedPulseLines};
use crate::telemetry::{create_shared_log, SharedMeasurementLog};

/// Minimum loop time between drains, in milliseconds.
pub const DEFAULT_POLL_THRESHOLD_MS: u64 = 160;

/// Tunables for a [`GeigerMonitor`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Loop time that must be exceeded before the lines are drained
    pub poll_threshold_ms: u64,
    /// Number of 6-second buckets in the window
    pub history_size: usize,
    /// CPM per µSv/h
    pub alpha: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_threshold_ms: DEFAULT_POLL_THRESHOLD_MS,
            history_size: DEFAULT_HISTORY_SIZE,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// What one polling cycle drained and decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Radiation pulses drained
    pub radiation: u32,
    /// Noise pulses drained
    pub noise: u32,
    /// Whether the radiation line fired since the previous cycle
    pub radiation_event: bool,
    /// Whether the noise line fired since the previous cycle
    pub noise_event: bool,
    /// Whether the cycle passed the noise gate
    pub counted: bool,
    /// Time since the previous cycle, in milliseconds
    pub elapsed_ms: u64,
}

impl CycleOutcome {
    fn new(sample: &CycleSample, counted: bool, elapsed_ms: u64) -> Self {
        Self {
            radiation: sample.radiation.count,
            noise: sample.noise.count,
            radiation_event: sample.radiation.event,
            noise_event: sample.noise.event,
            counted,
            elapsed_ms,
        }
    }
}

/// Dose-rate monitor for one two-line Geiger sensor.
pub struct GeigerMonitor {
    config: MonitorConfig,
    clock: Box<dyn Clock>,
    lines: SharedPulseLines,
    accumulator: WindowedRateAccumulator,
    tracker: ElapsedTimeTracker,
    estimator: DoseEstimator,
    callbacks: CallbackRegistry,
    readings: ReadingBuilder,
    log: SharedMeasurementLog,
    /// Loop time accumulated since the last drain
    loop_elapsed_ms: u64,
    /// Clock reading at the previous `tick`
    last_tick_ms: u64,
    /// Radiation pulses drained by the most recent cycle
    last_radiation_count: u32,
}

impl GeigerMonitor {
    /// Create a monitor timed by the wall clock.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Create a monitor timed by `clock`.
    ///
    /// All buckets start empty and measured time starts at the clock's
    /// current reading.
    pub fn with_clock<C: Clock + 'static>(config: MonitorConfig, clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            accumulator: WindowedRateAccumulator::new(config.history_size),
            estimator: DoseEstimator::new(config.alpha),
            tracker: ElapsedTimeTracker::new(now),
            clock: Box::new(clock),
            lines: PulseLines::shared(),
            callbacks: CallbackRegistry::new(),
            readings: ReadingBuilder::new(),
            log: create_shared_log(),
            loop_elapsed_ms: 0,
            last_tick_ms: now,
            last_radiation_count: 0,
            config,
        }
    }

    /// Handle for the edge side (sources, interrupt handlers).
    pub fn lines(&self) -> SharedPulseLines {
        SharedPulseLines::clone(&self.lines)
    }

    /// Run the polling cycle if the threshold has been exceeded.
    ///
    /// Returns the cycle's outcome, or `None` if this call only accumulated
    /// loop time. Never blocks beyond the drain's critical section.
    pub fn tick(&mut self) -> Option<CycleOutcome> {
        let now = self.clock.now_ms();
        self.loop_elapsed_ms = self
            .loop_elapsed_ms
            .saturating_add(now.saturating_sub(self.last_tick_ms));
        self.last_tick_ms = now;

        if self.loop_elapsed_ms <= self.config.poll_threshold_ms {
            return None;
        }
        self.loop_elapsed_ms = 0;

        let sample = self.lines.drain();

        let counted = !sample.is_noisy();
        if counted {
            self.accumulator.advance(
                self.tracker.total_seconds(),
                u64::from(sample.radiation.count),
            );
        }
        let elapsed_ms = self.tracker.record(now, counted);
        self.last_radiation_count = sample.radiation.count;
        self.log.record_cycle(&sample, counted);

        if counted {
            tracing::trace!(
                radiation = sample.radiation.count,
                elapsed_ms,
                window_count = self.accumulator.running_total(),
                "cycle counted"
            );
        } else {
            tracing::debug!(
                radiation = sample.radiation.count,
                noise = sample.noise.count,
                elapsed_ms,
                "noisy cycle discarded"
            );
        }

        if sample.radiation.event {
            self.dispatch(PulseKind::Radiation);
        }
        if sample.noise.event {
            self.dispatch(PulseKind::Noise);
        }

        Some(CycleOutcome::new(&sample, counted, elapsed_ms))
    }

    fn dispatch(&mut self, kind: PulseKind) {
        if self.callbacks.fire(kind) {
            self.log.record_event_dispatched();
        }
    }

    /// Install the radiation handler, replacing any earlier one.
    pub fn register_radiation_handler<F>(&mut self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks
            .set(PulseKind::Radiation, Some(Box::new(handler) as Handler));
    }

    /// Install the noise handler, replacing any earlier one.
    pub fn register_noise_handler<F>(&mut self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks
            .set(PulseKind::Noise, Some(Box::new(handler) as Handler));
    }

    pub fn clear_radiation_handler(&mut self) {
        self.callbacks.set(PulseKind::Radiation, None);
    }

    pub fn clear_noise_handler(&mut self) {
        self.callbacks.set(PulseKind::Noise, None);
    }

    /// Install or clear (`None`) the handler for `kind`.
    pub fn set_handler(&mut self, kind: PulseKind, handler: Option<Handler>) {
        self.callbacks.set(kind, handler);
    }

    /// Measured time since setup, noisy intervals excluded, in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.tracker.total_ms()
    }

    /// Window length the rate is normalised by, in minutes.
    pub fn window_minutes(&self) -> f64 {
        self.accumulator.window_minutes(self.tracker.total_ms())
    }

    /// Pulses inside the current window.
    pub fn window_count(&self) -> u64 {
        self.accumulator.running_total()
    }

    pub fn last_radiation_count(&self) -> u32 {
        self.last_radiation_count
    }

    pub fn cpm(&self) -> f64 {
        self.estimator.cpm(self.window_count(), self.window_minutes())
    }

    pub fn usvh(&self) -> f64 {
        self.estimator.usvh(self.window_count(), self.window_minutes())
    }

    pub fn usvh_error(&self) -> f64 {
        self.estimator
            .usvh_error(self.window_count(), self.window_minutes())
    }

    pub fn dose(&self) -> DoseRate {
        self.estimator
            .estimate(self.window_count(), self.window_minutes())
    }

    /// Header line for [`GeigerMonitor::csv_status`].
    pub fn csv_keys(&self) -> &'static str {
        CSV_KEYS
    }

    /// Current status as one CSV line.
    pub fn csv_status(&self) -> String {
        self.reading().to_csv_line()
    }

    /// Current state as a serializable reading.
    pub fn reading(&self) -> DoseReading {
        self.readings.build(ReadingInput {
            duration_ms: self.duration_ms(),
            count: self.last_radiation_count,
            window_count: self.window_count(),
            window_minutes: self.window_minutes(),
            dose: self.dose(),
        })
    }

    pub fn accumulator(&self) -> &WindowedRateAccumulator {
        &self.accumulator
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn session_id(&self) -> String {
        self.readings.session_id()
    }

    pub fn log(&self) -> &SharedMeasurementLog {
        &self.log
    }
}

impl std::fmt::Debug for GeigerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeigerMonitor")
            .field("config", &self.config)
            .field("accumulator", &self.accumulator)
            .field("tracker", &self.tracker)
            .field("callbacks", &self.callbacks)
            .field("loop_elapsed_ms", &self.loop_elapsed_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    fn monitor() -> (GeigerMonitor, ManualClock) {
        let clock = ManualClock::new();
        let monitor = GeigerMonitor::with_clock(MonitorConfig::default(), clock.clone());
        (monitor, clock)
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (mut monitor, clock) = monitor();
        clock.advance(DEFAULT_POLL_THRESHOLD_MS);
        assert!(monitor.tick().is_none());

        clock.advance(1);
        assert!(monitor.tick().is_some());
    }

    #[test]
    fn test_loop_time_resets_after_drain() {
        let (mut monitor, clock) = monitor();
        clock.advance(200);
        assert!(monitor.tick().is_some());

        clock.advance(100);
        assert!(monitor.tick().is_none());
        clock.advance(100);
        assert!(monitor.tick().is_some());
    }

    #[test]
    fn test_clean_cycle_counts_pulses_and_time() {
        let (mut monitor, clock) = monitor();
        let lines = monitor.lines();
        lines.on_radiation();
        lines.on_radiation();

        clock.advance(200);
        let outcome = monitor.tick().unwrap();
        assert!(outcome.counted);
        assert_eq!(outcome.radiation, 2);
        assert_eq!(outcome.elapsed_ms, 200);

        assert_eq!(monitor.window_count(), 2);
        assert_eq!(monitor.duration_ms(), 200);
        assert_eq!(monitor.last_radiation_count(), 2);
    }

    #[test]
    fn test_noisy_cycle_consumes_but_does_not_count() {
        let (mut monitor, clock) = monitor();
        let lines = monitor.lines();
        lines.on_radiation();
        lines.on_noise();

        clock.advance(200);
        let outcome = monitor.tick().unwrap();
        assert!(!outcome.counted);
        assert_eq!(monitor.window_count(), 0);
        assert_eq!(monitor.duration_ms(), 0);
        assert_eq!(lines.pending(PulseKind::Radiation), 0);
        assert_eq!(lines.pending(PulseKind::Noise), 0);

        // The noisy interval is skipped, not deferred to the next clean one
        clock.advance(200);
        monitor.tick().unwrap();
        assert_eq!(monitor.duration_ms(), 200);
    }

    #[test]
    fn test_readings_are_zero_before_any_cycle() {
        let (monitor, _clock) = monitor();
        assert_eq!(monitor.dose(), DoseRate::default());
        assert_eq!(monitor.csv_status(), "0,0,0.000,0.000,0.000");
        assert_eq!(monitor.csv_keys(), "time(ms),count,cpm,uSv/h,uSv/hError");
    }

    #[test]
    fn test_cpm_during_warm_up() {
        let (mut monitor, clock) = monitor();
        let lines = monitor.lines();

        // 30 seconds of clean 200 ms cycles, one pulse every cycle
        for _ in 0..150 {
            lines.on_radiation();
            clock.advance(200);
            monitor.tick().unwrap();
        }

        assert_eq!(monitor.duration_ms(), 30_000);
        assert_eq!(monitor.window_count(), 150);
        assert!((monitor.window_minutes() - 0.5).abs() < 1e-12);
        assert!((monitor.cpm() - 300.0).abs() < 1e-9);
        assert!((monitor.usvh() - 300.0 / DEFAULT_ALPHA).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_alpha_uses_default_calibration() {
        let clock = ManualClock::new();
        let mut monitor = GeigerMonitor::with_clock(
            MonitorConfig {
                alpha: -5.0,
                ..MonitorConfig::default()
            },
            clock.clone(),
        );
        for _ in 0..10 {
            monitor.lines().on_radiation();
        }
        clock.advance(60_000);
        monitor.tick().unwrap();

        assert!((monitor.usvh() - 10.0 / DEFAULT_ALPHA).abs() < 1e-12);
    }

    #[test]
    fn test_noise_handler_fires_on_noise() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let (mut monitor, clock) = monitor();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        monitor.register_noise_handler(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        monitor.lines().on_noise();
        clock.advance(200);
        monitor.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        monitor.clear_noise_handler();
        monitor.lines().on_noise();
        clock.advance(200);
        monitor.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.log().stats().events_dispatched, 1);
    }
}
