//! Simulated Geiger sensor.
//!
//! Each enabled line runs on its own thread and fires edges with exponentially
//! distributed gaps, i.e. as a Poisson process at the configured rate. This
//! exercises the pulse lines exactly the way interrupt handlers would: edges
//! land at arbitrary points relative to the polling cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Exp;

use super::{PulseKind, PulseSource, SharedPulseLines, SourceError};

/// Longest single sleep, so `stop()` is honoured promptly.
const MAX_SLEEP: Duration = Duration::from_millis(50);

/// Longest gap between two simulated pulses.
const MAX_GAP: Duration = Duration::from_secs(3_600);

/// Rates for the simulated sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSourceConfig {
    /// Mean radiation pulses per minute
    pub radiation_cpm: f64,
    /// Mean noise pulses per minute (0 disables the noise line)
    pub noise_per_minute: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatedSourceConfig {
    fn default() -> Self {
        Self {
            // Typical background near sea level for this sensor class
            radiation_cpm: 6.0,
            noise_per_minute: 0.0,
            seed: None,
        }
    }
}

/// Poisson pulse generator.
pub struct SimulatedSource {
    config: SimulatedSourceConfig,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl SimulatedSource {
    pub fn new(config: SimulatedSourceConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    fn spawn_line(
        &self,
        kind: PulseKind,
        per_minute: f64,
        seed: Option<u64>,
        lines: SharedPulseLines,
    ) -> Result<JoinHandle<()>, SourceError> {
        let gaps = Exp::new(per_minute / 60.0)
            .map_err(|e| SourceError::InvalidRate(format!("{kind}: {e}")))?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name(format!("pulse-{kind}"))
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let gap = pulse_gap(gaps.sample(&mut rng));
                    if !sleep_while_running(gap, &running) {
                        break;
                    }
                    lines.on_edge(kind);
                }
            })
            .map_err(|e| SourceError::SpawnFailed(e.to_string()))
    }
}

impl PulseSource for SimulatedSource {
    fn start(&mut self, lines: SharedPulseLines) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        validate_rate("radiation", self.config.radiation_cpm)?;
        validate_rate("noise", self.config.noise_per_minute)?;

        self.running.store(true, Ordering::SeqCst);

        // Derive distinct per-line seeds so the two lines are not correlated.
        let seeds = self
            .config
            .seed
            .map(|seed| (seed, seed.wrapping_add(0x9e37_79b9_7f4a_7c15)));
        let rates = [
            (PulseKind::Radiation, self.config.radiation_cpm, seeds.map(|s| s.0)),
            (PulseKind::Noise, self.config.noise_per_minute, seeds.map(|s| s.1)),
        ];

        for (kind, per_minute, seed) in rates {
            if per_minute <= 0.0 {
                continue;
            }
            match self.spawn_line(kind, per_minute, seed, Arc::clone(&lines)) {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
        }

        tracing::info!(
            radiation_cpm = self.config.radiation_cpm,
            noise_per_minute = self.config.noise_per_minute,
            "simulated source started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("simulated pulse thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.threads.iter().all(|t| !t.is_finished())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_rate(line: &str, per_minute: f64) -> Result<(), SourceError> {
    if per_minute.is_finite() && per_minute >= 0.0 {
        Ok(())
    } else {
        Err(SourceError::InvalidRate(format!(
            "{line} rate must be a finite, non-negative number (got {per_minute})"
        )))
    }
}

/// Convert a sampled gap in seconds to a sleep, capped at [`MAX_GAP`].
///
/// Very low rates sample gaps too large for a `Duration`.
fn pulse_gap(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds)
        .unwrap_or(MAX_GAP)
        .min(MAX_GAP)
}

/// Sleep for `total`, waking regularly to check `running`.
///
/// Returns false if the source was stopped before the sleep finished.
fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(MAX_SLEEP));
    }
}
