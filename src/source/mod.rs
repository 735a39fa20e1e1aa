//! Pulse sources for the Geiger dose agent.
//!
//! A source stands in for the sensor's two interrupt lines: it runs on its own
//! thread(s) and calls the edge handlers of a [`PulseLines`] as pulses arrive.
//! The polling side never talks to a source directly, only to the lines.

pub mod lines;
pub mod noop;
#[cfg(feature = "simulated")]
pub mod simulated;
pub mod types;

// Re-export commonly used types
pub use lines::{CycleSample, DrainedPulses, PulseEdgeCounter, PulseLines, SharedPulseLines};
pub use noop::NoopSource;
#[cfg(feature = "simulated")]
pub use simulated::{SimulatedSource, SimulatedSourceConfig};
pub use types::{PulseKind, SensorEvent};

use crate::config::{SourceConfig, SourceKind};

/// Something that delivers edges to a pair of pulse lines.
pub trait PulseSource: Send {
    /// Attach to the lines and begin delivering edges.
    fn start(&mut self, lines: SharedPulseLines) -> Result<(), SourceError>;

    /// Detach from the lines. Idempotent.
    fn stop(&mut self);

    /// Whether the source is currently delivering edges.
    fn is_running(&self) -> bool;

    /// Short name for logs and status output.
    fn name(&self) -> &'static str;
}

/// Errors that can occur while starting a pulse source.
#[derive(Debug)]
pub enum SourceError {
    AlreadyRunning,
    InvalidRate(String),
    Unsupported(String),
    SpawnFailed(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::AlreadyRunning => write!(f, "Pulse source is already running"),
            SourceError::InvalidRate(e) => write!(f, "Invalid pulse rate: {e}"),
            SourceError::Unsupported(e) => write!(f, "Unsupported pulse source: {e}"),
            SourceError::SpawnFailed(e) => write!(f, "Could not start source thread: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Build the source selected by the configuration.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn PulseSource>, SourceError> {
    match config.kind {
        SourceKind::None => Ok(Box::new(NoopSource::new())),
        #[cfg(feature = "simulated")]
        SourceKind::Simulated => Ok(Box::new(SimulatedSource::new(SimulatedSourceConfig {
            radiation_cpm: config.radiation_cpm,
            noise_per_minute: config.noise_per_minute,
            seed: config.seed,
        }))),
        #[cfg(not(feature = "simulated"))]
        SourceKind::Simulated => Err(SourceError::Unsupported(
            "simulated source requires the `simulated` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_none() {
        let config = SourceConfig {
            kind: SourceKind::None,
            ..SourceConfig::default()
        };
        let source = from_config(&config).unwrap();
        assert_eq!(source.name(), "none");
        assert!(!source.is_running());
    }

    #[cfg(feature = "simulated")]
    #[test]
    fn test_from_config_simulated() {
        let source = from_config(&SourceConfig::default()).unwrap();
        assert_eq!(source.name(), "simulated");
    }
}
