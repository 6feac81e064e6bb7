//! Error types for photo-grab
//!
//! This module provides error handling for the crate, including:
//! - A single crate-wide [`Error`] enum with contextual variants
//! - Process exit code mapping for the command-line front end
//!
//! Only fatal conditions travel as errors out of the pipeline. Per-item download
//! failures are absorbed by the workers and surface as log lines and events.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for photo-grab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for photo-grab
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Configuration file could not be parsed
    #[error("invalid configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// Network error (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The HTTP status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// A request URL could not be built
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL (or template expansion) that failed to parse
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Remote filename cannot be used as a local file name
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    /// Destination file exists and the collision policy is Skip
    #[error("file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Convert errors to process exit codes for the command-line front end
///
/// A graceful shutdown (natural drain or signal) exits with 0 and never
/// goes through this trait.
pub trait ToExitCode {
    /// Get the process exit code for this error
    fn exit_code(&self) -> u8;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> u8 {
        match self {
            // 2 - usage / configuration problems
            Error::Config { .. } => 2,
            Error::ConfigFile(_) => 2,
            Error::InvalidUrl { .. } => 2,

            // 3 - remote side unreachable or misbehaving
            Error::Network(_) => 3,
            Error::HttpStatus { .. } => 3,

            // 4 - local storage problems
            Error::Io(_) => 4,
            Error::FileExists(_) => 4,
            Error::InvalidFilename(_) => 4,

            // 1 - everything else
            Error::Serialization(_) => 1,
            Error::Other(_) => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::ConfigFile(_) => "config_file_error",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::Network(_) => "network_error",
            Error::HttpStatus { .. } => "http_status",
            Error::Io(_) => "io_error",
            Error::FileExists(_) => "file_exists",
            Error::InvalidFilename(_) => "invalid_filename",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}
