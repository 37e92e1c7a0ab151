//! Layered settings: defaults, then the settings file, then the
//! environment, then command-line flags.

use std::path::Path;

use serde::{Deserialize, Serialize};
use swarmwait_cluster::DockerConfig;
use swarmwait_converge::ConvergeConfig;

use crate::cli::WaitArgs;

/// Contents of `swarmwait.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub converge: ConvergeConfig,
    #[serde(default)]
    pub docker: DockerConfig,
}

impl Settings {
    /// Parse a settings document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or holds an
    /// invalid value.
    pub fn from_toml(content: &str) -> swarmwait_core::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> swarmwait_core::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| swarmwait_core::Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Settings from an optional file with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or an environment
    /// variable holds a malformed value.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(Self {
            converge: base.converge.with_env_overrides()?,
            docker: base.docker.with_env_overrides()?,
        })
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.docker.host = host;
        }
        self
    }

    /// The converge config with the wait flags applied.
    pub fn converge_for(&self, wait: &WaitArgs) -> ConvergeConfig {
        let mut config = self.converge;
        if let Some(timeout) = wait.timeout {
            config = config.timeout(timeout);
        }
        if let Some(delay) = wait.delay {
            config = config.delay(delay);
        }
        if let Some(interval) = wait.min_interval {
            config = config.min_poll_interval(interval);
        }
        if let Some(interval) = wait.max_interval {
            config = config.max_poll_interval(interval);
        }
        config
    }
}
