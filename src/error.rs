//! Error types for tagwatch.
//!
//! Uses `thiserror` for ergonomic error definitions. Each layer has its own
//! error type; [`ScanError`] is the one subscribers see on the identity stream.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a tag transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The poll wait elapsed without a tag. The transport has already closed
    /// its session when this is returned.
    #[error("Operation timed out")]
    Timeout,

    #[error("Tag hardware is not available")]
    Unavailable,

    /// The session was released while an operation was waiting on it.
    #[error("Tag session was closed")]
    SessionClosed,

    #[error("Tag was lost: {0}")]
    TagLost(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this is the expected poll timeout rather than a fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by detector and encrypter collaborators.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// A tag exchange issued by the detector failed.
    #[error("Tag exchange failed: {0}")]
    Exchange(#[from] TransportError),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main error type for the scan loop.
#[derive(Error, Debug)]
pub enum ScanError {
    /// `start()` was called while the hardware reports itself unavailable.
    #[error("Tag hardware is not available")]
    Unavailable,

    /// The scan loop has been closed and accepts no further operations.
    #[error("Scan loop is closed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The worker task panicked or was aborted.
    #[error("Scan worker failed: {0}")]
    Worker(String),
}

impl ScanError {
    /// Whether this error is the transport's expected poll timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine configuration directory")]
    DirectoryNotFound,

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid setting '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
