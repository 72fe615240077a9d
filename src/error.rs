//! Error types for the Calculator Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
///
/// Every variant surfaced from a reconciliation pass is retryable; the
/// controller applies backoff and re-delivers the key.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Create raced another writer
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// The call context was cancelled before the API call completed
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object returned by the API is missing required metadata
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Derived value does not fit the result type
    #[error("Arithmetic overflow computing result for {0}")]
    Overflow(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid object error
    pub fn invalid_object(msg: impl Into<String>) -> Self {
        Error::InvalidObject(msg.into())
    }

    /// Whether the error came from an aborted call context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
