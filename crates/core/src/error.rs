//! Error types for bfs-core
//!
//! Filesystem operations surface exactly three kinds of failure: a missing
//! key, a missing caller argument, or anything else the backend reported.
//! The remaining variants belong to configuration loading.

use thiserror::Error;

/// Result type alias for bfs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bfs-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The addressed key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller omitted a required value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other backend failure (network, auth, service-side, timeout)
    #[error("Backend error on '{path}': {message}")]
    Backend { path: String, message: String },

    /// Configuration file or value error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Wrap a backend failure together with the path being operated on
    pub fn backend(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Backend {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing key
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
