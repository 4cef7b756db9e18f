//! Custom error types for gatewarden.
//!
//! The taxonomy mirrors how faults travel through a run: configuration
//! problems abort before any gate starts, while everything raised inside a
//! gate is contained at the gate boundary and turned into a result.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gatewarden operations
#[derive(Error, Debug)]
pub enum GateError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Malformed or out-of-range configuration. Fails the run up front.
    #[error("Invalid configuration: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// Failed to load a configuration file
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Unrecognised execution context string
    #[error("Unknown execution context: {0}")]
    UnknownContext(String),

    // =========================================================================
    // Gate Errors
    // =========================================================================
    /// Fault inside a gate's check
    #[error("Gate '{gate}' failed to execute: {message}")]
    Execution { gate: String, message: String },

    /// Gate exceeded its time budget
    #[error("Gate '{gate}' timed out after {seconds}s")]
    Timeout { gate: String, seconds: u64 },

    /// Gate observed the shared cancellation signal
    #[error("Gate '{gate}' was cancelled")]
    Cancelled { gate: String },

    /// Source file could not be parsed
    #[error("Failed to parse {file}: {message}")]
    Parse { file: PathBuf, message: String },

    /// Optional external analyzer is missing
    #[error("Tool unavailable: {tool}")]
    ToolUnavailable { tool: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// History store could not be read or written
    #[error("History error: {message}")]
    History { message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GateError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an execution error for a gate
    pub fn execution(gate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            gate: gate.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error for a gate
    pub fn cancelled(gate: impl Into<String>) -> Self {
        Self::Cancelled { gate: gate.into() }
    }

    /// Create a tool-unavailable error
    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    /// Create a history error
    pub fn history(message: impl Into<String>) -> Self {
        Self::History {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Whether this error means the gate should be reported as skipped.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether this error should trigger an internal fallback algorithm.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. })
    }

    /// Check whether an `anyhow` error wraps a cancellation.
    pub fn is_cancelled_anyhow(err: &anyhow::Error) -> bool {
        err.downcast_ref::<GateError>()
            .is_some_and(GateError::is_cancellation)
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Config { .. } | Self::UnknownContext(_) => 2,
            Self::ToolUnavailable { .. } => 3,
            _ => 1,
        }
    }
}

/// Type alias for gatewarden results
pub type Result<T> = std::result::Result<T, GateError>;
