//! A source that never emits pulses.
//!
//! Useful for dry runs of the CLI and for tests that drive the pulse lines by
//! hand.

use super::{PulseSource, SharedPulseLines, SourceError};

/// A noop source that never delivers edges.
#[derive(Debug, Default)]
pub struct NoopSource {
    lines: Option<SharedPulseLines>,
}

impl NoopSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PulseSource for NoopSource {
    fn start(&mut self, lines: SharedPulseLines) -> Result<(), SourceError> {
        if self.lines.is_some() {
            return Err(SourceError::AlreadyRunning);
        }
        self.lines = Some(lines);
        Ok(())
    }

    fn stop(&mut self) {
        self.lines = None;
    }

    fn is_running(&self) -> bool {
        self.lines.is_some()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PulseLines;

    #[test]
    fn test_noop_lifecycle() {
        let mut source = NoopSource::new();
        assert!(!source.is_running());

        source.start(PulseLines::shared()).unwrap();
        assert!(source.is_running());
        assert!(matches!(
            source.start(PulseLines::shared()),
            Err(SourceError::AlreadyRunning)
        ));

        source.stop();
        assert!(!source.is_running());
    }
}
