//! timequeue configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::queue::QueueConfig;

/// Main configuration for the `tq` binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Queue tuning
    pub queue: QueueConfig,

    /// Defaults for `tq demo`
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .timequeue.yml
        let local_config = PathBuf::from(".timequeue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/timequeue/timequeue.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".timequeue.yml")];
                paths.extend(Self::user_config_path());
                paths
            }
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("timequeue").join("timequeue.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Defaults for the random demo schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of messages to schedule
    pub count: usize,

    /// Upper bound for a message's delay in milliseconds
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Priorities are drawn from `0..=max-priority`
    #[serde(rename = "max-priority")]
    pub max_priority: i64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            count: 10,
            max_delay_ms: 2_000,
            max_priority: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, None);
        assert_eq!(config.queue, QueueConfig::default());
        assert_eq!(config.demo.count, 10);
        assert_eq!(config.demo.max_delay_ms, 2_000);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log-level: debug\nqueue:\n  initial-capacity: 8\ndemo:\n  count: 3\n  max-delay-ms: 50"
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.queue.initial_capacity, 8);
        assert_eq!(config.queue.default_priority, 0);
        assert_eq!(config.demo.count, 3);
        assert_eq!(config.demo.max_delay_ms, 50);
        assert_eq!(config.demo.max_priority, 3);

        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/timequeue.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue: [not, a, map]").unwrap();

        let path = file.path().to_path_buf();
        assert!(Config::load(Some(&path)).is_err());
    }
}
