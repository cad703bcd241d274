//! Error types for odbc-relay.
//!
//! Every failure in the connect/execute/read pipeline is scoped to a single
//! call and surfaces to the caller as a human-readable message.

use thiserror::Error;

/// Main error type for odbc-relay operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A driver handle (environment, connection or statement) could not be allocated.
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// The driver refused the connection string.
    #[error("Failed to connect to the database: {0}")]
    Connect(String),

    /// The statement text could not be prepared.
    #[error("Failed to prepare the statement: {0}")]
    Prepare(String),

    /// The prepared statement failed to execute.
    #[error("Failed to execute the statement: {0}")]
    Execute(String),

    /// Column count or column description could not be read.
    #[error("Failed to read result metadata: {0}")]
    Metadata(String),

    /// Row fetch or value retrieval failed mid-stream.
    #[error("Failed to fetch rows: {0}")]
    Fetch(String),

    /// Caller supplied unusable input (e.g. empty statement text).
    #[error("Invalid statement: {0}")]
    InvalidInput(String),

    /// The background pipeline did not finish within the configured timeout.
    #[error("Statement timed out: {0}")]
    Timeout(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (background task panicked, unexpected state, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Creates an allocation error with the given message.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Creates a connect error with the given message.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Creates a prepare error with the given message.
    pub fn prepare(msg: impl Into<String>) -> Self {
        Self::Prepare(msg.into())
    }

    /// Creates an execute error with the given message.
    pub fn execute(msg: impl Into<String>) -> Self {
        Self::Execute(msg.into())
    }

    /// Creates a metadata error with the given message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Creates a fetch error with the given message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Creates an invalid-input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Allocation(_) => "Allocation Error",
            Self::Connect(_) => "Connection Error",
            Self::Prepare(_) => "Prepare Error",
            Self::Execute(_) => "Execute Error",
            Self::Metadata(_) => "Metadata Error",
            Self::Fetch(_) => "Fetch Error",
            Self::InvalidInput(_) => "Invalid Input",
            Self::Timeout(_) => "Timeout",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connect() {
        let err = RelayError::connect("[unixODBC] Data source name not found");
        assert_eq!(
            err.to_string(),
            "Failed to connect to the database: [unixODBC] Data source name not found"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = RelayError::invalid_input("statement text is empty");
        assert_eq!(err.to_string(), "Invalid statement: statement text is empty");
        assert_eq!(err.category(), "Invalid Input");
    }

    #[test]
    fn test_error_display_prepare_and_execute() {
        assert_eq!(
            RelayError::prepare("syntax error").to_string(),
            "Failed to prepare the statement: syntax error"
        );
        assert_eq!(
            RelayError::execute("table t does not exist").to_string(),
            "Failed to execute the statement: table t does not exist"
        );
    }

    #[test]
    fn test_error_display_fetch() {
        let err = RelayError::fetch("communication link failure");
        assert_eq!(err.to_string(), "Failed to fetch rows: communication link failure");
        assert_eq!(err.category(), "Fetch Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = RelayError::config("value_capacity must be at least 2");
        assert_eq!(
            err.to_string(),
            "Configuration error: value_capacity must be at least 2"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RelayError>();
    }
}
