//! Sliding-window pulse accumulation.
//!
//! Counts are collected into fixed 6-second buckets held in a ring. A running
//! total is kept alongside so CPM never needs a full re-sum: entering a bucket
//! evicts whatever it held from the total, adding a count adds to both. Once
//! the ring has wrapped, the total covers only the most recent
//! `history_size * 6` seconds of measured time.

/// Length of one bucket in seconds.
pub const BUCKET_SECONDS: u64 = 6;

/// Number of buckets in the ring (a 20 minute window).
pub const DEFAULT_HISTORY_SIZE: usize = 200;

/// Largest ring accepted (a 24 hour window).
pub const MAX_HISTORY_SIZE: usize = 14_400;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Ring of per-bucket pulse counts with an incrementally maintained total.
#[derive(Debug, Clone)]
pub struct WindowedRateAccumulator {
    /// Pulse count per bucket
    buckets: Vec<u64>,
    /// Bucket currently receiving counts
    current: usize,
    /// Last 6-second slot a rotation was processed for
    previous_slot: u64,
    /// Sum of all buckets
    running_total: u64,
}

impl WindowedRateAccumulator {
    /// Create an accumulator with `history_size` buckets, clamped to
    /// `1..=MAX_HISTORY_SIZE`.
    pub fn new(history_size: usize) -> Self {
        Self {
            buckets: vec![0; history_size.clamp(1, MAX_HISTORY_SIZE)],
            current: 0,
            previous_slot: 0,
            running_total: 0,
        }
    }

    /// Add one cycle's radiation count.
    ///
    /// `total_seconds` is the measured time before this cycle's delta is added.
    /// Each 6-second slot boundary crossed since the previous call moves the
    /// ring forward one bucket, evicting and clearing it before the count lands.
    /// At the normal ~160 ms polling cadence every cycle crosses at most one
    /// boundary, so this is a single rotation per 6-second boundary.
    pub fn advance(&mut self, total_seconds: u64, count: u64) {
        let slot = total_seconds / BUCKET_SECONDS;
        if slot != self.previous_slot {
            let crossed = slot.saturating_sub(self.previous_slot).max(1);
            let steps = usize::try_from(crossed)
                .unwrap_or(usize::MAX)
                .min(self.buckets.len());
            for _ in 0..steps {
                self.rotate();
            }
            self.previous_slot = slot;
        }

        self.buckets[self.current] += count;
        self.running_total += count;
    }

    fn rotate(&mut self) {
        self.current = (self.current + 1) % self.buckets.len();
        let evicted = std::mem::take(&mut self.buckets[self.current]);
        if evicted > 0 {
            self.running_total -= evicted;
        }
    }

    /// Pulses currently inside the window.
    pub fn running_total(&self) -> u64 {
        self.running_total
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn history_size(&self) -> usize {
        self.buckets.len()
    }

    /// Full span of the ring in milliseconds.
    pub fn span_ms(&self) -> u64 {
        (self.buckets.len() as u64)
            .saturating_mul(BUCKET_SECONDS)
            .saturating_mul(1_000)
    }

    /// Effective window length in minutes for `total_ms` of measured time.
    ///
    /// Uses the measured time while warming up and the full ring span after.
    pub fn window_minutes(&self, total_ms: u64) -> f64 {
        total_ms.min(self.span_ms()) as f64 / MS_PER_MINUTE
    }
}

impl Default for WindowedRateAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

/// Measured time, excluding intervals discarded for noise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElapsedTimeTracker {
    total_ms: u64,
    previous_sample_ms: u64,
}

impl ElapsedTimeTracker {
    /// Start tracking at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            total_ms: 0,
            previous_sample_ms: now_ms,
        }
    }

    /// Close the interval ending at `now_ms`.
    ///
    /// The interval is added to the total only when `counted`; the sample
    /// instant moves forward either way. Returns the interval length.
    pub fn record(&mut self, now_ms: u64, counted: bool) -> u64 {
        let delta = now_ms.saturating_sub(self.previous_sample_ms);
        if counted {
            self.total_ms = self.total_ms.saturating_add(delta);
        }
        self.previous_sample_ms = now_ms;
        delta
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_ms / 1_000
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_total_matches(acc: &WindowedRateAccumulator) {
        assert_eq!(acc.running_total(), acc.buckets().iter().sum::<u64>());
    }

    #[test]
    fn test_cold_start_does_not_rotate() {
        let mut acc = WindowedRateAccumulator::new(4);
        acc.advance(0, 3);
        acc.advance(0, 2);

        assert_eq!(acc.current_index(), 0);
        assert_eq!(acc.buckets(), &[5, 0, 0, 0]);
        assert_eq!(acc.running_total(), 5);
    }

    #[test]
    fn test_rotates_on_bucket_boundary() {
        let mut acc = WindowedRateAccumulator::new(4);
        acc.advance(0, 1);
        acc.advance(5, 1);
        assert_eq!(acc.current_index(), 0);

        acc.advance(6, 4);
        assert_eq!(acc.current_index(), 1);
        // Same slot again must not rotate twice
        acc.advance(7, 1);
        assert_eq!(acc.current_index(), 1);

        assert_eq!(acc.buckets(), &[2, 5, 0, 0]);
        assert_total_matches(&acc);
    }

    #[test]
    fn test_old_buckets_age_out() {
        let mut acc = WindowedRateAccumulator::new(3);
        for slot in 0..10u64 {
            acc.advance(slot * BUCKET_SECONDS, 2);
            assert_total_matches(&acc);
        }
        assert_eq!(acc.running_total(), 6);
    }

    #[test]
    fn test_sparse_advance_clears_skipped_buckets() {
        let mut acc = WindowedRateAccumulator::new(4);
        acc.advance(0, 10);
        acc.advance(6, 10);
        // Jump three slots ahead: two stale buckets cleared plus the new one
        acc.advance(24, 1);

        assert_eq!(acc.current_index(), 0);
        assert_eq!(acc.buckets(), &[1, 10, 0, 0]);
        assert_total_matches(&acc);

        // A jump longer than the ring empties it
        acc.advance(600, 0);
        assert_eq!(acc.running_total(), 0);
    }

    #[test]
    fn test_zero_history_is_clamped() {
        let mut acc = WindowedRateAccumulator::new(0);
        assert_eq!(acc.history_size(), 1);
        acc.advance(0, 1);
        acc.advance(6, 1);
        assert_eq!(acc.running_total(), 1);
    }

    #[test]
    fn test_oversized_history_is_clamped() {
        let acc = WindowedRateAccumulator::new(usize::MAX / 8);
        assert_eq!(acc.history_size(), MAX_HISTORY_SIZE);
        assert_eq!(acc.span_ms(), 24 * 60 * 60 * 1_000);
    }

    #[test]
    fn test_window_minutes_warm_up_then_capped() {
        let acc = WindowedRateAccumulator::new(10);
        assert_eq!(acc.span_ms(), 60_000);
        assert!((acc.window_minutes(0)).abs() < f64::EPSILON);
        assert!((acc.window_minutes(30_000) - 0.5).abs() < 1e-12);
        assert!((acc.window_minutes(600_000) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tracker_skips_uncounted_intervals() {
        let mut tracker = ElapsedTimeTracker::new(1_000);
        assert_eq!(tracker.record(1_200, true), 200);
        assert_eq!(tracker.record(1_400, false), 200);
        assert_eq!(tracker.record(1_500, true), 100);

        assert_eq!(tracker.total_ms(), 300);
        // The sample instant moved to 1_500 even though 1_200..1_400 was skipped
        assert_eq!(tracker.record(1_600, true), 100);
    }
}
