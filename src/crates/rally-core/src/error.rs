//! Error types for rally
//!
//! Provides a unified error type for identity, gateway and flow operations.

use thiserror::Error;

/// Result type alias for rally operations
pub type Result<T> = std::result::Result<T, RallyError>;

/// Main error type for rally operations
#[derive(Debug, Error)]
pub enum RallyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Realtime channel error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input rejected before it reached the backend
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The visitor already answered this kind in the current session
    #[error("Already submitted: {0}")]
    AlreadySubmitted(String),

    /// A submission of this kind is still waiting for the backend
    #[error("Submission already in flight: {0}")]
    SubmissionInFlight(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl RallyError {
    /// Whether the error came from the network or the remote service
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Backend { .. } | Self::Realtime(_)
        )
    }

    /// Whether the error is a client-side guard rejection
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::AlreadySubmitted(_)
                | Self::SubmissionInFlight(_)
        )
    }
}

impl From<toml::de::Error> for RallyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<String> for RallyError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for RallyError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RallyError::Backend {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 409: duplicate key");
    }

    #[test]
    fn test_error_classification() {
        assert!(RallyError::Realtime("closed".into()).is_remote());
        assert!(!RallyError::Storage("denied".into()).is_remote());
        assert!(RallyError::AlreadySubmitted("votes".into()).is_rejection());
        assert!(RallyError::Validation("empty".into()).is_rejection());
        assert!(!RallyError::Other("x".into()).is_rejection());
    }
}
