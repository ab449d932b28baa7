//! Config file loading for the cronmill binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cronmill_core::SchedulerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// A job declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Five-field cron expression.
    pub schedule: String,
    /// Shell command, run through `sh -c`.
    pub command: String,
}

/// Top-level cronmill configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronmillConfig {
    /// Path to the SQLite database (default: ~/.cronmill/jobs.db).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Scheduler timing knobs.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Jobs keyed by code.
    #[serde(default)]
    pub jobs: HashMap<String, JobSpec>,
}

impl CronmillConfig {
    /// The database path, defaulting into the config directory.
    pub fn resolve_db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("jobs.db")),
        }
    }
}

/// Resolve the cronmill config directory (~/.cronmill/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".cronmill"))
        .ok_or(ConfigError::NoDirFound)
}

/// Load configuration from the given path, or from the default location,
/// falling back to defaults if the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<CronmillConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_dir()?.join("config.toml"),
    };
    if !path.exists() {
        tracing::warn!("No config file at {}, using defaults", path.display());
        return Ok(CronmillConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let raw = r#"
            db_path = "/tmp/cronmill-test/jobs.db"

            [scheduler]
            schedule_ahead = 120
            schedule_lifetime = 5

            [jobs.heartbeat]
            schedule = "*/15 * * * *"
            command = "curl -fsS https://example.com/ping"
        "#;
        let config: CronmillConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.scheduler.schedule_ahead, 120);
        assert_eq!(config.scheduler.schedule_lifetime, 5);
        // unset knobs keep their defaults
        assert_eq!(config.scheduler.max_running_time, 60);
        assert_eq!(config.jobs["heartbeat"].schedule, "*/15 * * * *");
        assert_eq!(
            config.resolve_db_path().unwrap(),
            PathBuf::from("/tmp/cronmill-test/jobs.db")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: CronmillConfig = toml::from_str("").unwrap();
        assert!(config.jobs.is_empty());
        assert_eq!(config.scheduler.schedule_ahead, 60);
        assert_eq!(config.scheduler.success_log_lifetime, 1440);
    }
}
