//! Configuration for the Geiger dose agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::{
    MonitorConfig, DEFAULT_ALPHA, DEFAULT_HISTORY_SIZE, DEFAULT_POLL_THRESHOLD_MS,
    MAX_HISTORY_SIZE,
};

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loop time that must be exceeded before the pulse lines are drained (ms)
    pub poll_threshold_ms: u64,

    /// Number of 6-second buckets in the rate window
    pub history_buckets: usize,

    /// Sensor calibration, CPM per µSv/h
    pub alpha: f64,

    /// How often the CLI prints a reading
    #[serde(with = "duration_serde")]
    pub report_interval: Duration,

    /// Output line format
    pub output_format: OutputFormat,

    /// Which pulse source feeds the monitor
    pub source: SourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_threshold_ms: DEFAULT_POLL_THRESHOLD_MS,
            history_buckets: DEFAULT_HISTORY_SIZE,
            alpha: DEFAULT_ALPHA,
            report_interval: Duration::from_secs(6),
            output_format: OutputFormat::Csv,
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geiger-dose-agent")
            .join("config.json")
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_HISTORY_SIZE).contains(&self.history_buckets) {
            return Err(ConfigError::InvalidValue(format!(
                "history_buckets must be between 1 and {MAX_HISTORY_SIZE} (got {})",
                self.history_buckets
            )));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "alpha must be a positive number (got {})",
                self.alpha
            )));
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "report_interval must be at least 1 second".to_string(),
            ));
        }
        self.source.validate()
    }

    /// Monitor settings derived from this configuration.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_threshold_ms: self.poll_threshold_ms,
            history_size: self.history_buckets,
            alpha: self.alpha,
        }
    }
}

/// Line format for printed readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Header plus comma-separated status lines
    Csv,
    /// One JSON reading per line
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "jsonl" | "json" => Ok(OutputFormat::Jsonl),
            other => Err(ConfigError::ParseError(format!(
                "unknown output format '{other}' (expected csv or jsonl)"
            ))),
        }
    }
}

/// Kind of pulse source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Poisson pulse generator
    Simulated,
    /// No pulses at all
    None,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "sim" => Ok(SourceKind::Simulated),
            "none" | "noop" => Ok(SourceKind::None),
            other => Err(ConfigError::ParseError(format!(
                "unknown source '{other}' (expected simulated or none)"
            ))),
        }
    }
}

/// Configuration for the pulse source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Mean radiation pulses per minute (simulated source)
    pub radiation_cpm: f64,
    /// Mean noise pulses per minute (simulated source)
    pub noise_per_minute: f64,
    /// Fixed RNG seed (simulated source)
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Simulated,
            radiation_cpm: 6.0,
            noise_per_minute: 0.0,
            seed: None,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("radiation_cpm", self.radiation_cpm),
            ("noise_per_minute", self.noise_per_minute),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be a non-negative number (got {rate})"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_threshold_ms, 160);
        assert_eq!(config.history_buckets, 200);
        assert_eq!(config.output_format, OutputFormat::Csv);
        assert_eq!(config.source.kind, SourceKind::Simulated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"alpha": 100.0, "source": {"kind": "none"}}"#).unwrap();
        assert!((config.alpha - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.source.kind, SourceKind::None);
        assert_eq!(config.history_buckets, DEFAULT_HISTORY_SIZE);
        assert_eq!(config.report_interval, Duration::from_secs(6));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            history_buckets: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = Config {
            alpha: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.noise_per_minute = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_history() {
        let config = Config {
            history_buckets: usize::MAX / 8,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = Config {
            history_buckets: MAX_HISTORY_SIZE,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert!("xml".parse::<OutputFormat>().is_err());

        assert_eq!("sim".parse::<SourceKind>().unwrap(), SourceKind::Simulated);
        assert_eq!("none".parse::<SourceKind>().unwrap(), SourceKind::None);
        assert!("gpio".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.poll_threshold_ms = 250;
        config.source.seed = Some(42);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.poll_threshold_ms, 250);
        assert_eq!(loaded.source.seed, Some(42));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.poll_threshold_ms, DEFAULT_POLL_THRESHOLD_MS);
    }

    #[test]
    fn test_monitor_config() {
        let monitor = Config::default().monitor_config();
        assert_eq!(monitor, MonitorConfig::default());
    }
}
