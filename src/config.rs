// src/config.rs

//! Manages daemon configuration: loading from TOML, command-line overrides, and validation.

use crate::core::cluster::ClusterOptions;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The resolved daemon configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default)]
    pub pidfile: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fallback nodes file used when no `CTDB_NODES*` variable is set.
    #[serde(default)]
    pub nodes_file: Option<PathBuf>,
    #[serde(default = "default_recovery_poll_interval_ms")]
    pub recovery_poll_interval_ms: u64,
    #[serde(default = "default_simulate_timeouts")]
    pub simulate_timeouts: bool,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/fake-ctdbd.socket")
}
fn default_log_level() -> String {
    "error".to_string()
}
fn default_recovery_poll_interval_ms() -> u64 {
    1000
}
fn default_simulate_timeouts() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pidfile: None,
            log_level: default_log_level(),
            nodes_file: None,
            recovery_poll_interval_ms: default_recovery_poll_interval_ms(),
            simulate_timeouts: default_simulate_timeouts(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{}'", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(anyhow!("socket_path cannot be empty"));
        }
        if self.recovery_poll_interval_ms == 0 {
            return Err(anyhow!("recovery_poll_interval_ms cannot be 0"));
        }
        Ok(())
    }

    pub fn to_cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            nodes_file: self.nodes_file.clone(),
            simulate_timeouts: self.simulate_timeouts,
            recovery_poll_interval: Duration::from_millis(self.recovery_poll_interval_ms),
        }
    }
}

/// Maps a ctdb debug level name (as accepted by `--debug`) to a tracing filter
/// directive. Numeric levels 0..=4 are accepted as well.
pub fn debug_level_filter(level: &str) -> Option<&'static str> {
    match level.to_ascii_uppercase().as_str() {
        "ERR" | "ERROR" | "0" => Some("error"),
        "WARNING" | "1" => Some("warn"),
        "NOTICE" | "2" => Some("info"),
        "INFO" | "3" | "DEBUG" | "4" => Some("debug"),
        _ => None,
    }
}
