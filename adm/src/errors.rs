//! Error types for stratadm

use thiserror::Error;

/// Main error type for stratadm
#[derive(Error, Debug)]
pub enum AdmError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid hosts: {0}")]
    InvalidHosts(String),

    #[error("No services matched")]
    NoServicesMatched,

    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("Container not found for service {0}, is the service deployed?")]
    ContainerNotFound(String),

    #[error("Cluster state unavailable: {0}")]
    StateUnavailable(String),

    #[error("Connection to {target} failed: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Unsupported host protocol: {0}")]
    ProtocolUnsupported(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdmError {
    pub fn connection_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        AdmError::ConnectionFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the operation that produced this error.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdmError::StateUnavailable(_) | AdmError::ConnectionFailed { .. }
        )
    }
}

impl From<anyhow::Error> for AdmError {
    fn from(err: anyhow::Error) -> Self {
        AdmError::Internal(err.to_string())
    }
}
