//! Summarizer settings and the TOML file they can be loaded from.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

pub const DEFAULT_SUMMARY_INTERVAL: Duration = Duration::from_secs(600);
pub const MINIMUM_SUMMARY_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RETENTION: usize = 24;
pub const MINIMUM_RETENTION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizerOptions {
    /// Time between summary passes.
    pub interval: Duration,
    /// Hour buckets kept before the oldest are evicted.
    pub retention: usize,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        SummarizerOptions {
            interval: DEFAULT_SUMMARY_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl SummarizerOptions {
    /// Raises both settings to their floors.
    pub fn clamped(self) -> Self {
        SummarizerOptions {
            interval: self.interval.max(MINIMUM_SUMMARY_INTERVAL),
            retention: self.retention.max(MINIMUM_RETENTION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub interval_secs: u64,
    pub retention_hours: usize,
    /// Counters created (and summarized) at startup.
    pub counters: Vec<String>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        TallyConfig {
            interval_secs: DEFAULT_SUMMARY_INTERVAL.as_secs(),
            retention_hours: DEFAULT_RETENTION,
            counters: Vec::new(),
        }
    }
}

impl TallyConfig {
    /// Loads the config at `path`. Returns `TallyConfig::default()` if the file doesn't exist;
    /// other I/O and parse errors are reported.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TallyConfig::default()),
            Err(e) => Err(TallyError::Config(format!("{}: {e}", path.display()))),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TallyError::Config(e.to_string()))
    }

    pub fn summarizer_options(&self) -> SummarizerOptions {
        SummarizerOptions {
            interval: Duration::from_secs(self.interval_secs),
            retention: self.retention_hours,
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_are_applied() {
        let options = SummarizerOptions {
            interval: Duration::from_secs(5),
            retention: 1,
        }
        .clamped();
        assert_eq!(options.interval, MINIMUM_SUMMARY_INTERVAL);
        assert_eq!(options.retention, MINIMUM_RETENTION);
        assert_eq!(SummarizerOptions::default().clamped(), SummarizerOptions::default());
    }

    #[test]
    fn parses_partial_config() {
        let config = TallyConfig::parse("counters = [\"connections\", \"queue\"]\n").unwrap();
        assert_eq!(config.interval_secs, 600);
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.counters, vec!["connections", "queue"]);

        let config = TallyConfig::parse("interval_secs = 30\nretention_hours = 48\n").unwrap();
        let options = config.summarizer_options();
        assert_eq!(options.interval, Duration::from_secs(60));
        assert_eq!(options.retention, 48);
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(
            TallyConfig::parse("interval_secs = \"soon\""),
            Err(TallyError::Config(_))
        ));
    }

    #[test]
    fn missing_file_yields_default() {
        let config = TallyConfig::load(Path::new("/definitely/not/here/tally.toml")).unwrap();
        assert_eq!(config, TallyConfig::default());
    }
}
