use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub storage: StorageConfig,
    pub timers: TimerConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the `localStorage` database. `None` uses the platform
    /// data directory.
    pub data_dir: Option<PathBuf>,
    /// Partition key inside the database.
    pub origin: String,
    /// When false `localStorage` is kept in memory like `sessionStorage`.
    pub persistent: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            origin: "default".to_string(),
            persistent: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub min_interval_ms: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on promise jobs run after a single evaluation.
    pub max_pending_jobs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_pending_jobs: 1000,
        }
    }
}

impl ShimConfig {
    /// Read a YAML config; a missing path or file yields the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Defaults with storage kept in memory; handy for tests and one-off runs.
    pub fn ephemeral() -> Self {
        let mut config = Self::default();
        config.storage.persistent = false;
        config
    }
}
