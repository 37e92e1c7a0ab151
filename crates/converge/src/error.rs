//! Error types for convergence.

use std::time::Duration;

use swarmwait_core::format_duration;
use thiserror::Error;

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a wait for convergence ended without success.
#[derive(Error, Debug)]
pub enum Error {
    /// The timeout elapsed before the service converged.
    #[error("service with ID ({service_id}) did not converge after {}", go(.timeout))]
    DidNotConverge {
        service_id: String,
        timeout: Duration,
    },

    /// The orchestrator rolled the update back.
    #[error("service rollback completed: {message}")]
    RollbackCompleted {
        service_id: String,
        timeout: Duration,
        message: String,
    },

    /// The orchestrator paused the update.
    #[error("service update paused: {message}")]
    UpdatePaused {
        service_id: String,
        timeout: Duration,
        message: String,
    },

    /// The orchestrator paused the rollback.
    #[error("service rollback paused: {message}")]
    RollbackPaused {
        service_id: String,
        timeout: Duration,
        message: String,
    },

    /// The service is not replicated with an explicit replica count.
    #[error("service with ID ({service_id}) has no replica count")]
    NoReplicaCount { service_id: String },

    /// A cluster query failed. Queries are not retried.
    #[error("querying service with ID ({service_id}) failed: {source}")]
    Cluster {
        service_id: String,
        timeout: Duration,
        #[source]
        source: swarmwait_cluster::Error,
    },

    /// The caller cancelled the wait.
    #[error("waiting for service with ID ({service_id}) was cancelled")]
    Cancelled {
        service_id: String,
        timeout: Duration,
    },

    /// Creation failed and removing the service afterwards failed too.
    #[error("{primary} (removing the service afterwards also failed: {teardown})")]
    TeardownFailed {
        #[source]
        primary: Box<Error>,
        teardown: swarmwait_cluster::Error,
    },

    /// The converge configuration is unusable.
    #[error("invalid converge configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration could not be loaded.
    #[error("core error: {0}")]
    Core(#[from] swarmwait_core::Error),
}

fn go(timeout: &Duration) -> String {
    format_duration(*timeout)
}

impl Error {
    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a cluster query error.
    pub fn cluster(
        service_id: impl Into<String>,
        timeout: Duration,
        source: swarmwait_cluster::Error,
    ) -> Self {
        Self::Cluster {
            service_id: service_id.into(),
            timeout,
            source,
        }
    }

    /// The service the error is about.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            Self::DidNotConverge { service_id, .. }
            | Self::RollbackCompleted { service_id, .. }
            | Self::UpdatePaused { service_id, .. }
            | Self::RollbackPaused { service_id, .. }
            | Self::NoReplicaCount { service_id }
            | Self::Cluster { service_id, .. }
            | Self::Cancelled { service_id, .. } => Some(service_id),
            Self::TeardownFailed { primary, .. } => primary.service_id(),
            Self::InvalidConfig { .. } | Self::Core(_) => None,
        }
    }

    /// The timeout the wait was configured with.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::DidNotConverge { timeout, .. }
            | Self::RollbackCompleted { timeout, .. }
            | Self::UpdatePaused { timeout, .. }
            | Self::RollbackPaused { timeout, .. }
            | Self::Cluster { timeout, .. }
            | Self::Cancelled { timeout, .. } => Some(*timeout),
            Self::TeardownFailed { primary, .. } => primary.timeout(),
            Self::NoReplicaCount { .. } | Self::InvalidConfig { .. } | Self::Core(_) => None,
        }
    }

    /// Whether the wait ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self.primary(), Self::DidNotConverge { .. })
    }

    /// Whether the orchestrator reached a state that waiting longer cannot
    /// fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.primary(),
            Self::RollbackCompleted { .. }
                | Self::UpdatePaused { .. }
                | Self::RollbackPaused { .. }
                | Self::NoReplicaCount { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.primary(), Self::Cancelled { .. })
    }

    /// The original failure, looking through a failed teardown.
    pub fn primary(&self) -> &Self {
        match self {
            Self::TeardownFailed { primary, .. } => primary.primary(),
            other => other,
        }
    }
}
