//! Edge counters shared between the interrupt side and the polling cycle.
//!
//! Each signal line owns a [`PulseEdgeCounter`]: a count and a "new event" flag.
//! Edge handlers only ever increment-and-flag; the polling cycle only ever
//! read-and-resets. [`PulseLines`] pairs the two counters behind a gate that
//! plays the role of interrupt masking: edge handlers pass through it shared,
//! a drain holds it exclusively, so both counters are captured as one unit and
//! no increment can land between a read and its reset.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::types::PulseKind;

/// Count and event flag captured by one drain of a [`PulseEdgeCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainedPulses {
    /// Pulses seen since the previous drain
    pub count: u32,
    /// Whether any edge arrived since the previous drain
    pub event: bool,
}

/// Pulse counter fed from asynchronous (interrupt-like) context.
///
/// The count wraps on overflow. Drains happen every ~160 ms, and a pulse rate
/// able to wrap a `u32` in that interval is outside the sensor's envelope.
#[derive(Debug, Default)]
pub struct PulseEdgeCounter {
    count: AtomicU32,
    event_flag: AtomicBool,
}

impl PulseEdgeCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            event_flag: AtomicBool::new(false),
        }
    }

    /// Record one edge. Safe to call from any thread at any time.
    pub fn on_edge(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
        self.event_flag.store(true, Ordering::Release);
    }

    /// Read and reset both the count and the flag.
    ///
    /// Callers wanting the pair to be consistent with concurrent edges must hold
    /// the exclusive side of the [`PulseLines`] gate.
    pub fn drain(&self) -> DrainedPulses {
        DrainedPulses {
            count: self.count.swap(0, Ordering::AcqRel),
            event: self.event_flag.swap(false, Ordering::AcqRel),
        }
    }

    /// Current count without resetting it.
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

/// Both counters drained in one critical section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSample {
    pub radiation: DrainedPulses,
    pub noise: DrainedPulses,
}

impl CycleSample {
    /// A cycle is noisy when any noise pulse was drained.
    pub fn is_noisy(&self) -> bool {
        self.noise.count > 0
    }
}

/// The radiation and noise lines of one sensor.
#[derive(Debug, Default)]
pub struct PulseLines {
    mask: RwLock<()>,
    radiation: PulseEdgeCounter,
    noise: PulseEdgeCounter,
}

/// Handle given to pulse sources.
pub type SharedPulseLines = Arc<PulseLines>;

impl PulseLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedPulseLines {
        Arc::new(Self::new())
    }

    /// Edge handler for the radiation line.
    pub fn on_radiation(&self) {
        self.on_edge(PulseKind::Radiation);
    }

    /// Edge handler for the noise line.
    pub fn on_noise(&self) {
        self.on_edge(PulseKind::Noise);
    }

    /// Edge handler for either line.
    ///
    /// Blocks only while a drain holds the mask, the same way an interrupt
    /// stays pending until interrupts are re-enabled.
    pub fn on_edge(&self, kind: PulseKind) {
        let _unmasked = self.mask.read().unwrap_or_else(PoisonError::into_inner);
        self.counter(kind).on_edge();
    }

    /// Drain both counters, radiation first, with edge delivery masked.
    pub fn drain(&self) -> CycleSample {
        let _masked = self.mask.write().unwrap_or_else(PoisonError::into_inner);
        let radiation = self.radiation.drain();
        let noise = self.noise.drain();
        CycleSample { radiation, noise }
    }

    /// Pulses waiting for the next drain on a line.
    pub fn pending(&self, kind: PulseKind) -> u32 {
        self.counter(kind).pending()
    }

    fn counter(&self, kind: PulseKind) -> &PulseEdgeCounter {
        match kind {
            PulseKind::Radiation => &self.radiation,
            PulseKind::Noise => &self.noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_edge_increments_and_flags() {
        let counter = PulseEdgeCounter::new();
        counter.on_edge();
        counter.on_edge();
        counter.on_edge();

        assert_eq!(
            counter.drain(),
            DrainedPulses {
                count: 3,
                event: true
            }
        );
        assert_eq!(counter.drain(), DrainedPulses::default());
    }

    #[test]
    fn test_count_wraps_on_overflow() {
        let counter = PulseEdgeCounter::new();
        counter.count.store(u32::MAX, Ordering::Relaxed);
        counter.on_edge();
        assert_eq!(counter.drain().count, 0);
    }

    #[test]
    fn test_lines_drain_both_counters() {
        let lines = PulseLines::new();
        lines.on_radiation();
        lines.on_radiation();
        lines.on_noise();

        let sample = lines.drain();
        assert_eq!(sample.radiation.count, 2);
        assert!(sample.radiation.event);
        assert_eq!(sample.noise.count, 1);
        assert!(sample.is_noisy());

        let sample = lines.drain();
        assert_eq!(sample, CycleSample::default());
        assert!(!sample.is_noisy());
    }

    #[test]
    fn test_no_pulse_lost_under_concurrent_drains() {
        let lines = PulseLines::shared();
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let lines = Arc::clone(&lines);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        lines.on_radiation();
                    }
                })
            })
            .collect();

        let mut drained: u64 = 0;
        while producers.iter().any(|p| !p.is_finished()) {
            drained += u64::from(lines.drain().radiation.count);
        }
        for producer in producers {
            producer.join().unwrap();
        }
        drained += u64::from(lines.drain().radiation.count);

        assert_eq!(drained, 40_000);
    }
}
