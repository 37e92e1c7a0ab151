//! Error types for the cluster crate.

use thiserror::Error;

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Messages the orchestrator uses when the object is already gone or its
/// removal is already under way. Matched case-insensitively.
const ALREADY_GONE_MESSAGES: [&str; 3] = [
    "no such container",
    "no such service",
    "is already in progress",
];

/// Errors returned by orchestrator API calls.
#[derive(Error, Debug)]
pub enum Error {
    /// The object does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The request conflicts with the object's current state (HTTP 409).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Any other non-success response from the orchestrator.
    #[error("orchestrator returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The container wait endpoint reported an error in its body.
    #[error("waiting for container '{container_id}' failed: {message}")]
    ContainerWait {
        container_id: String,
        message: String,
    },

    /// The response could not be interpreted.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] swarmwait_core::Error),
}

impl Error {
    /// Map an HTTP status and daemon message to the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound { message },
            409 => Self::Conflict { message },
            _ => Self::Api { status, message },
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Whether the error means the target is already removed, or is being
    /// removed by someone else. Removal calls treat these as success.
    pub fn is_already_gone(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Conflict { message }
            | Self::Api { message, .. }
            | Self::ContainerWait { message, .. } => {
                let lowered = message.to_lowercase();
                ALREADY_GONE_MESSAGES
                    .iter()
                    .any(|needle| lowered.contains(needle))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_variants() {
        assert!(matches!(
            Error::from_status(404, "gone"),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            Error::from_status(409, "busy"),
            Error::Conflict { .. }
        ));
        assert!(matches!(
            Error::from_status(500, "boom"),
            Error::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_already_gone_detection() {
        assert!(Error::not_found("service abc").is_already_gone());
        assert!(Error::from_status(409, "removal of container abc is already in progress")
            .is_already_gone());
        assert!(Error::from_status(500, "No such container: abc").is_already_gone());
        assert!(!Error::from_status(500, "internal error").is_already_gone());
        assert!(!Error::config("bad host").is_already_gone());
    }

    #[test]
    fn test_container_wait_error_display() {
        let err = Error::ContainerWait {
            container_id: "c1".to_string(),
            message: "No such container: c1".to_string(),
        };
        assert!(err.to_string().contains("c1"));
        assert!(err.is_already_gone());
    }
}
