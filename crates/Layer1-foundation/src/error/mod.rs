//! Error types for AutoHub
//!
//! Every layer reports failures through this one enum so the transport can
//! map variants to caller-visible rejections without string matching.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// AutoHub error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Caller input
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown automation type: {0}")]
    UnknownType(String),

    #[error("Unsupported script type: {0}")]
    UnsupportedType(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Already running: {0}")]
    AlreadyRunning(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Execution
    // ========================================================================
    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // External error conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than a fault
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::UnknownType(_)
                | Error::UnsupportedType(_)
                | Error::InvalidName(_)
                | Error::AlreadyRunning(_)
                | Error::InvalidInput(_)
        )
    }

    /// Short machine-readable kind, used by transports as an error code
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::UnknownType(_) => "unknown_type",
            Error::UnsupportedType(_) => "unsupported_type",
            Error::InvalidName(_) => "invalid_name",
            Error::AlreadyRunning(_) => "already_running",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config(_) => "config",
            Error::Http(_) => "http",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(Error::NotFound("x".into()).is_user_facing());
        assert!(Error::AlreadyRunning("x".into()).is_user_facing());
        assert!(Error::InvalidName("..".into()).is_user_facing());
        assert!(!Error::Internal("boom".into()).is_user_facing());
        assert!(!Error::Config("bad".into()).is_user_facing());
    }

    #[test]
    fn test_kind_and_display() {
        let err = Error::UnknownType("Nope".into());
        assert_eq!(err.kind(), "unknown_type");
        assert_eq!(err.to_string(), "Unknown automation type: Nope");

        let err: Error = "exploded".into();
        assert_eq!(err.kind(), "internal");
    }
}
