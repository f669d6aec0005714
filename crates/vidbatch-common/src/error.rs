//! Common error types used throughout vidbatch.

/// Common error type for vidbatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested batch or job was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation conflicts with the current state (e.g. cancelling a finished batch).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("batch 42");
        assert_eq!(err.to_string(), "Not found: batch 42");

        let err = Error::invalid_input("bitrate must be positive");
        assert_eq!(err.to_string(), "Invalid input: bitrate must be positive");

        let err = Error::conflict("batch already finished");
        assert_eq!(err.to_string(), "Conflict: batch already finished");

        let err = Error::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
