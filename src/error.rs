//! Error types for jira-import
//!
//! Defines the error enum covering every failure mode of the import pipeline.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Error type for import operations
#[derive(Error, Debug)]
pub enum ImportError {
    /// Configuration errors, including missing credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid field mapping or table definition
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Storage errors raised by the pipeline itself
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network errors that did not come from reqwest directly
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Remote answered 503 Service Unavailable
    #[error("Service unavailable (HTTP 503): {0}")]
    Unavailable(String),

    /// Remote answered with a status the pipeline does not handle
    #[error("Jira API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Retry budget spent on a transient failure
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Endpoint name not present in the registry
    #[error("Unknown endpoint '{name}' (registered: {registered})")]
    UnknownEndpoint { name: String, registered: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ImportError {
    /// True for errors raised by the target store
    pub fn is_storage(&self) -> bool {
        matches!(self, ImportError::Storage(_) | ImportError::Database(_))
    }
}

impl crate::integrations::retry::RetryableError for ImportError {
    fn retry_decision(&self) -> crate::integrations::retry::RetryDecision {
        use crate::integrations::retry::RetryDecision;

        match self {
            // Retryable errors
            ImportError::Unavailable(_) => RetryDecision::Retry,
            ImportError::Network(_) => RetryDecision::Retry,
            ImportError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            }
            // Non-retryable errors
            ImportError::Config(_) => RetryDecision::NoRetry,
            ImportError::Mapping(_) => RetryDecision::NoRetry,
            ImportError::Storage(_) => RetryDecision::NoRetry,
            ImportError::Parse(_) => RetryDecision::NoRetry,
            ImportError::Api { .. } => RetryDecision::NoRetry,
            ImportError::RetriesExhausted { .. } => RetryDecision::NoRetry,
            ImportError::UnknownEndpoint { .. } => RetryDecision::NoRetry,
            ImportError::Io(_) => RetryDecision::NoRetry,
            ImportError::Json(_) => RetryDecision::NoRetry,
            ImportError::Yaml(_) => RetryDecision::NoRetry,
            ImportError::Database(_) => RetryDecision::NoRetry,
            ImportError::Other(_) => RetryDecision::NoRetry,
        }
    }
}
