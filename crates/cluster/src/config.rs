//! Configuration for the Docker Engine API client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use swarmwait_core::duration::go_format;
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_HOST: &str = "http://localhost:2375";

/// Configuration for [`DockerClient`](crate::DockerClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Daemon address: `tcp://`, `http://` or `https://`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Pin requests to an API version such as `1.43`.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Timeout for query and removal requests. Container waits are not
    /// bounded by it.
    #[serde(with = "go_format", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_version: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl DockerConfig {
    /// Create a config for the given host.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Pin the API version.
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Apply `DOCKER_HOST`, `DOCKER_API_VERSION` and
    /// `SWARMWAIT_REQUEST_TIMEOUT` on top of this config.
    ///
    /// # Errors
    ///
    /// Returns an error if `SWARMWAIT_REQUEST_TIMEOUT` is not a valid duration.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var("DOCKER_HOST") {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }

        if let Ok(version) = std::env::var("DOCKER_API_VERSION") {
            if !version.trim().is_empty() {
                self.api_version = Some(version);
            }
        }

        if let Ok(raw) = std::env::var("SWARMWAIT_REQUEST_TIMEOUT") {
            self.request_timeout = swarmwait_core::parse_duration(&raw)?;
        }

        Ok(self)
    }

    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// See [`DockerConfig::with_env_overrides`].
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// The HTTP base URL requests are joined onto, including the version
    /// prefix when one is pinned. Always ends with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unix sockets, named pipes, unknown
    /// schemes and malformed addresses.
    pub fn base_url(&self) -> Result<Url> {
        let host = self.host.trim();
        let normalized = if let Some(rest) = host.strip_prefix("tcp://") {
            format!("http://{rest}")
        } else if host.starts_with("unix://") || host.starts_with("npipe://") {
            return Err(Error::config(format!(
                "'{host}' is a local socket; expose the daemon over tcp to use it"
            )));
        } else if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            return Err(Error::config(format!("unsupported docker host '{host}'")));
        };

        let mut url = Url::parse(&normalized)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        match self.api_version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => {
                let version = version.trim_start_matches('v');
                Ok(url.join(&format!("v{version}/"))?)
            }
            _ => Ok(url),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}
