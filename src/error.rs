//! Error types for TideKV
//!
//! Provides a unified error type for all fallible operations. Failures of a
//! single command are not errors at this level: they are encoded into the
//! reply stream (see [`crate::protocol::CommandError`]).

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Result type alias using TideError
pub type Result<T> = std::result::Result<T, TideError>;

/// Unified error type for TideKV operations
#[derive(Debug, Error)]
pub enum TideError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Too many arguments: {count} (max {max})")]
    TooManyArgs { count: usize, max: usize },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    /// An error reply sent back by the server
    #[error("Server error ({0:?}): {1}")]
    Server(ErrorCode, String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
