//! Error types for the matching service.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The query skill list was empty or malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The embedding model could not be loaded or constructed.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The user directory could not be read.
    #[error("Directory error: {0}")]
    Directory(String),

    /// HTTP API failure.
    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for matching operations.
pub type Result<T> = std::result::Result<T, Error>;
