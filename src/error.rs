//! Error types for the partition client.

use thiserror::Error;

/// Result type alias for partition client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the partition client.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors, e.g. the local node missing from the cluster list.
    #[error("config error: {0}")]
    Config(String),

    /// Coordination service errors.
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    /// The client has been closed.
    #[error("partition client closed")]
    Closed,
}

/// Errors reported by a coordination (lock) service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Could not connect to the service.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The session was stopped or closed.
    #[error("session closed")]
    SessionClosed,

    /// The lock is not held by the caller.
    #[error("lock not held: {0}")]
    NotHeld(String),

    /// Generic failure reported by the service.
    #[error("operation failed on {path}: {reason}")]
    OperationFailed { path: String, reason: String },
}

impl Error {
    /// Build a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("cluster list is missing local server name");
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "config error: cluster list is missing local server name"
        );

        let err: Error = CoordinationError::SessionClosed.into();
        assert!(!err.is_config());
        assert_eq!(err.to_string(), "coordination error: session closed");
    }
}
