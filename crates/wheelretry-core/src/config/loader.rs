//! Layered configuration loader
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (`~/.wheelretry/wheelretry.yaml`, or an explicit path)
//! 3. Environment variables (`WHEELRETRY_*` prefix)
//! 4. CLI flags (handled by caller)

use std::env;
use std::fs;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{TimeUnit, WheelRetryConfig};
use crate::utils::default_config_dir;

/// File name looked up in the config directory
pub const CONFIG_FILE_NAME: &str = "wheelretry.yaml";

/// Environment variables that override file values, with the key they set
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("WHEELRETRY_TICK_DURATION_MS", "scheduler.tick-duration-ms"),
    ("WHEELRETRY_TICKS_PER_WHEEL", "scheduler.ticks-per-wheel"),
    ("WHEELRETRY_MAX_PENDING_TIMEOUTS", "scheduler.max-pending-timeouts"),
    ("WHEELRETRY_THREAD_NAME_PREFIX", "scheduler.thread-name-prefix"),
    ("WHEELRETRY_MAX_ATTEMPTS", "retry.max-attempts"),
    ("WHEELRETRY_DELAY", "retry.delay"),
    ("WHEELRETRY_DELAY_UNIT", "retry.delay-unit"),
];

/// Configuration loader
pub struct ConfigLoader {
    /// Base directory for the configuration file
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.wheelretry`
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_dir: default_config_dir()?,
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Path of the config file in the config directory
    pub fn default_config_path(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// The file `load` would read, if any
    ///
    /// An explicit path must exist. The default file is optional.
    pub fn config_file(&self, explicit: Option<&Utf8Path>) -> Result<Option<Utf8PathBuf>> {
        match explicit {
            Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
            Some(path) => Err(Error::config_not_found(path.as_str())),
            None => {
                let path = self.default_config_path();
                Ok(path.is_file().then_some(path))
            }
        }
    }

    /// Load the configuration with file and environment overrides applied
    ///
    /// The result is not validated; call `WheelRetryConfig::validate` once CLI
    /// overrides have been applied too.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<WheelRetryConfig> {
        let config = match self.config_file(explicit)? {
            Some(path) => {
                debug!(path = %path, "loading configuration file");
                Self::load_file(&path)?
            }
            None => {
                debug!(dir = %self.config_dir, "no configuration file, using defaults");
                WheelRetryConfig::default()
            }
        };

        Self::apply_env_overrides(config)
    }

    /// Load a YAML file and parse it
    ///
    /// Missing keys take their defaults, so an empty file is valid.
    pub fn load_file(path: &Utf8Path) -> Result<WheelRetryConfig> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(WheelRetryConfig::default());
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Apply `WHEELRETRY_*` environment variable overrides
    pub fn apply_env_overrides(mut config: WheelRetryConfig) -> Result<WheelRetryConfig> {
        if let Some(val) = env_value("WHEELRETRY_TICK_DURATION_MS")? {
            config.scheduler.tick_duration_ms = val;
        }

        if let Some(val) = env_value("WHEELRETRY_TICKS_PER_WHEEL")? {
            config.scheduler.ticks_per_wheel = val;
        }

        if let Some(val) = env_value("WHEELRETRY_MAX_PENDING_TIMEOUTS")? {
            config.scheduler.max_pending_timeouts = Some(val);
        }

        if let Ok(val) = env::var("WHEELRETRY_THREAD_NAME_PREFIX") {
            config.scheduler.thread_name_prefix = val;
        }

        if let Some(val) = env_value("WHEELRETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = val;
        }

        if let Some(val) = env_value("WHEELRETRY_DELAY")? {
            config.retry.delay = val;
        }

        if let Some(val) = env_value::<TimeUnit>("WHEELRETRY_DELAY_UNIT")? {
            config.retry.delay_unit = val;
        }

        Ok(config)
    }
}

/// Read and parse an environment variable, `None` when unset
fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}
