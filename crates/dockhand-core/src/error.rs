//! Error types for dockhand.

use thiserror::Error;

/// Result type alias using dockhand's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dockhand operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Configuration error, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (bad payload, corrupt PDF, non-PDF upload)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Credential encryption/decryption failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// AI provider call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation was cancelled by shutdown or deadline
    #[error("Operation cancelled: {0}")]
    Canceled(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_document_not_found() {
        let id = Uuid::nil();
        let err = Error::DocumentNotFound(id);
        assert_eq!(err.to_string(), format!("Document not found: {}", id));
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("DATABASE_URL is required".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: DATABASE_URL is required"
        );
    }

    #[test]
    fn test_error_display_job() {
        let err = Error::Job("no handler registered".to_string());
        assert_eq!(err.to_string(), "Job error: no handler registered");
    }

    #[test]
    fn test_error_display_canceled() {
        let err = Error::Canceled("shutdown".to_string());
        assert_eq!(err.to_string(), "Operation cancelled: shutdown");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
