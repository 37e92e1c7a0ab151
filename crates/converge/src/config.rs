//! Converge configuration.
//!
//! Durations use the Go syntax the orchestrator tooling uses everywhere
//! (`"7s"`, `"3m"`, `"1m30s"`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swarmwait_core::duration::go_format;
use swarmwait_core::parse_duration;

use crate::error::{Error, Result};

/// How long and how often to poll a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergeConfig {
    /// Upper bound on the whole wait, measured from the start of the call.
    #[serde(with = "go_format", default = "default_timeout")]
    pub timeout: Duration,

    /// Wait before the first poll.
    #[serde(with = "go_format", default = "default_delay")]
    pub delay: Duration,

    /// First interval between polls.
    #[serde(with = "go_format", default = "default_min_poll_interval")]
    pub min_poll_interval: Duration,

    /// Intervals double up to this bound.
    #[serde(with = "go_format", default = "default_max_poll_interval")]
    pub max_poll_interval: Duration,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            delay: default_delay(),
            min_poll_interval: default_min_poll_interval(),
            max_poll_interval: default_max_poll_interval(),
        }
    }
}

impl ConvergeConfig {
    /// Set the overall timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the first poll interval. Raises the maximum if it would fall
    /// below it.
    #[must_use]
    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self.max_poll_interval = self.max_poll_interval.max(interval);
        self
    }

    #[must_use]
    pub const fn max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    /// Apply `SWARMWAIT_TIMEOUT`, `SWARMWAIT_DELAY`,
    /// `SWARMWAIT_MIN_POLL_INTERVAL` and `SWARMWAIT_MAX_POLL_INTERVAL`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a valid duration.
    pub fn with_env_overrides(self) -> Result<Self> {
        let read = |key: &str| -> Result<Option<Duration>> {
            match std::env::var(key) {
                Ok(raw) if !raw.trim().is_empty() => Ok(Some(parse_duration(&raw)?)),
                _ => Ok(None),
            }
        };

        let mut config = self;
        if let Some(timeout) = read("SWARMWAIT_TIMEOUT")? {
            config.timeout = timeout;
        }
        if let Some(delay) = read("SWARMWAIT_DELAY")? {
            config.delay = delay;
        }
        if let Some(interval) = read("SWARMWAIT_MIN_POLL_INTERVAL")? {
            config.min_poll_interval = interval;
        }
        if let Some(interval) = read("SWARMWAIT_MAX_POLL_INTERVAL")? {
            config.max_poll_interval = interval;
        }
        Ok(config)
    }

    /// Defaults with environment overrides.
    ///
    /// # Errors
    ///
    /// See [`ConvergeConfig::with_env_overrides`].
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Parse a TOML document holding the config's fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a duration is
    /// malformed.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(swarmwait_core::Error::from)?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| swarmwait_core::Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Check the config can drive a wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero timeout, a zero poll
    /// interval, or a minimum interval above the maximum.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::invalid_config("timeout must be greater than zero"));
        }
        if self.min_poll_interval.is_zero() {
            return Err(Error::invalid_config(
                "min_poll_interval must be greater than zero",
            ));
        }
        if self.min_poll_interval > self.max_poll_interval {
            return Err(Error::invalid_config(format!(
                "min_poll_interval ({}) exceeds max_poll_interval ({})",
                swarmwait_core::format_duration(self.min_poll_interval),
                swarmwait_core::format_duration(self.max_poll_interval),
            )));
        }
        Ok(())
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(180)
}

const fn default_delay() -> Duration {
    Duration::from_secs(7)
}

const fn default_min_poll_interval() -> Duration {
    Duration::from_secs(5)
}

const fn default_max_poll_interval() -> Duration {
    Duration::from_secs(10)
}
