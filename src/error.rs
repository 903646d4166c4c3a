//! Error types for esprof

use std::io;
use thiserror::Error;

/// Result type for esprof operations
pub type Result<T> = std::result::Result<T, EsprofError>;

/// Errors that can occur in esprof
///
/// The exchange recorder itself never produces these; they come from the
/// surrounding plumbing (configuration, session registry, transport setup).
#[derive(Debug, Error)]
pub enum EsprofError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid session name
    #[error("Invalid session name: {0}")]
    InvalidSessionName(String),

    /// A session with this name is already registered
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Session registry is full
    #[error("Session limit reached: {limit}")]
    SessionLimit {
        /// Configured maximum
        limit: usize,
    },

    /// Request could not be built (bad method or URI)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON rendering failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
