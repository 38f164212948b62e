//! Configuration management for scrollwatch.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ScrollwatchError};
use crate::timing::ThrottleOptions;

/// Prefix for environment variable overrides, e.g. `SCROLLWATCH__SCROLL__THRESHOLD=50`.
const ENV_PREFIX: &str = "SCROLLWATCH";

/// Main configuration for scrollwatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrollwatchConfig {
    /// Defaults for the infinite-scroll directive
    #[serde(default)]
    pub scroll: ScrollDefaults,

    /// Defaults for throttled callbacks
    #[serde(default)]
    pub throttle: ThrottleDefaults,
}

/// Directive defaults applied when a binding leaves an option unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollDefaults {
    /// Quiet period for the debounced scroll handler, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Distance from the bottom that counts as "near bottom", in pixels
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for ScrollDefaults {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            threshold: default_threshold(),
        }
    }
}

impl ScrollDefaults {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Throttle settings used by hosts that rate-limit their load callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleDefaults {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub leading: bool,

    #[serde(default = "default_trailing")]
    pub trailing: bool,
}

impl Default for ThrottleDefaults {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            leading: false,
            trailing: default_trailing(),
        }
    }
}

impl ThrottleDefaults {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn options(&self) -> ThrottleOptions {
        ThrottleOptions {
            leading: self.leading,
            trailing: self.trailing,
        }
    }
}

fn default_delay_ms() -> u64 {
    500
}

fn default_threshold() -> f64 {
    100.0
}

fn default_interval_ms() -> u64 {
    500
}

fn default_trailing() -> bool {
    true
}

impl ScrollwatchConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading scrollwatch configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ScrollwatchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from an optional file, then apply `SCROLLWATCH__*`
    /// environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Layering configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<ScrollwatchConfig>()?;
        Ok(config)
    }
}
