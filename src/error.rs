//! Error types for `partyline`
//!
//! This module provides the error hierarchy used by the engine and the
//! command-line front end, and maps each error onto a process exit code.

use thiserror::Error;

pub use partyline_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `partyline` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (platform adapter failure)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Phase engine error (missing phase, expired core)
    pub const PHASE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `partyline` operations.
///
/// Aggregates all domain-specific errors and provides a unified
/// interface for exit code mapping.
#[derive(Debug, Error)]
pub enum PartylineError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Phase engine error
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// Game content error
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PartylineError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Content(_) | Self::Json(_) | Self::Yaml(_) => {
                ExitCode::CONFIG_ERROR
            }
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Phase(_) => ExitCode::PHASE_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Platform adapter errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during transport operations
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform rejected the operation
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The referenced message is unknown to the platform
    #[error("unknown message: {0}")]
    UnknownMessage(u64),

    /// The private reply token is missing or dead
    #[error("reply token unavailable for {0}")]
    TokenUnavailable(String),

    /// Message exceeds size limit
    #[error("message too large: {size} bytes (limit: {limit})")]
    MessageTooLarge {
        /// Actual message size in bytes
        size: usize,
        /// Configured size limit in bytes
        limit: usize,
    },
}

// ============================================================================
// Phase Engine Errors
// ============================================================================

/// Phase engine state machine errors.
///
/// Phase errors never escape a session; they are logged and the chain is
/// halted.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// Referenced phase does not exist in the graph
    #[error("phase not found: {0}")]
    NotFound(String),

    /// The core or phase was already expired
    #[error("phase invoked after expiry: {0}")]
    Expired(String),

    /// The driver task is gone
    #[error("driver unavailable for session {0}")]
    DriverGone(String),
}

// ============================================================================
// Content Errors
// ============================================================================

/// Game content loading errors.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Content file could not be read
    #[error("cannot read content file {path}: {source}")]
    Read {
        /// Path to the content file
        path: std::path::PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Content file could not be parsed
    #[error("cannot parse content file {path}: {message}")]
    Parse {
        /// Path to the content file
        path: std::path::PathBuf,
        /// Parser message
        message: String,
    },

    /// Not enough content to run a game
    #[error("content exhausted: {0}")]
    Exhausted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_constants() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::TRANSPORT_ERROR, 4);
        assert_eq!(ExitCode::PHASE_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: PartylineError = ConfigError::MissingFile {
            path: PathBuf::from("/missing.yaml"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_content_error_exit_code() {
        let err: PartylineError = ContentError::Exhausted("no questions".to_string()).into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_transport_error_exit_code() {
        let err: PartylineError = TransportError::Rejected("closed".to_string()).into();
        assert_eq!(err.exit_code(), ExitCode::TRANSPORT_ERROR);
    }

    #[test]
    fn test_phase_error_exit_code() {
        let err: PartylineError = PhaseError::NotFound("ENDING".to_string()).into();
        assert_eq!(err.exit_code(), ExitCode::PHASE_ERROR);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = PartylineError::Usage("bad flag".to_string());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let err: PartylineError = std::io::Error::other("boom").into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::MessageTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(err.to_string(), "message too large: 2048 bytes (limit: 1024)");
    }
}
