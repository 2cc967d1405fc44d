//! Error types and exit codes for feather
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure (host process failures included)
//! - 2: Usage error (bad flags/args, missing installation)
//! - 3: Input error (missing file, wrong extension, unreadable header)

mod macros;

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the feather binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Input error - missing or unreadable file (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during feather operations
#[derive(Error, Debug)]
pub enum FeatherError {
    // Usage errors (exit code 2)
    #[error("unknown format: {0} (expected: human or json)")]
    UnknownFormat(String),

    #[error("{0}")]
    UsageError(String),

    #[error("no Blender installation configured (add one with `feather installs add`)")]
    NoInstallation,

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    // Input errors (exit code 3)
    #[error("file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("not a .{expected} file: {path:?}")]
    WrongExtension { path: PathBuf, expected: String },

    #[error("unrecognized file header in {path:?}: {reason}")]
    UnrecognizedHeader { path: PathBuf, reason: String },

    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    // Generic failures (exit code 1)
    /// Recoverable: the link target already contains the item.
    #[error("{item} is already linked into {parent}")]
    AlreadyLinked { parent: String, item: String },

    #[error("host operation {operation} failed: {message}")]
    Host { operation: String, message: String },

    #[error("host process exited ({status}): {stderr}")]
    HostExited { status: String, stderr: String },

    #[error("host did not answer {operation} within {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("refusing to overwrite input file {path:?}")]
    WouldOverwriteInput { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to {operation} {target}: {reason}")]
    FailedOperationWithTarget {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),

    #[error("Interrupted. Remaining files were not processed.")]
    Interrupted,
}

impl FeatherError {
    /// Create an error for a failed IO operation with context
    pub fn io_operation(
        operation: &str,
        path: impl std::fmt::Display,
        error: impl std::fmt::Display,
    ) -> Self {
        FeatherError::FailedOperationWithTarget {
            operation: operation.to_string(),
            target: path.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl std::fmt::Display) -> Self {
        FeatherError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl std::fmt::Display) -> Self {
        FeatherError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for a host operation that reported a failure
    pub fn host(operation: &str, message: impl std::fmt::Display) -> Self {
        FeatherError::Host {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Create the recoverable "already linked" condition
    pub fn already_linked(parent: impl std::fmt::Display, item: impl std::fmt::Display) -> Self {
        FeatherError::AlreadyLinked {
            parent: parent.to_string(),
            item: item.to_string(),
        }
    }

    /// True for the benign link failure the rebuild stage swallows
    pub fn is_already_linked(&self) -> bool {
        matches!(self, FeatherError::AlreadyLinked { .. })
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FeatherError::UnknownFormat(_)
            | FeatherError::UsageError(_)
            | FeatherError::NoInstallation
            | FeatherError::InvalidValue { .. } => ExitCode::Usage,

            FeatherError::FileNotFound { .. }
            | FeatherError::WrongExtension { .. }
            | FeatherError::UnrecognizedHeader { .. }
            | FeatherError::NotFound { .. } => ExitCode::Data,

            FeatherError::AlreadyLinked { .. }
            | FeatherError::Host { .. }
            | FeatherError::HostExited { .. }
            | FeatherError::Timeout { .. }
            | FeatherError::WouldOverwriteInput { .. }
            | FeatherError::Io(_)
            | FeatherError::Json(_)
            | FeatherError::Toml(_)
            | FeatherError::FailedOperationWithTarget { .. }
            | FeatherError::Other(_)
            | FeatherError::Interrupted => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    fn error_type(&self) -> &'static str {
        match self {
            FeatherError::UnknownFormat(_) => "unknown_format",
            FeatherError::UsageError(_) => "usage_error",
            FeatherError::NoInstallation => "no_installation",
            FeatherError::InvalidValue { .. } => "invalid_value",
            FeatherError::FileNotFound { .. } => "file_not_found",
            FeatherError::WrongExtension { .. } => "wrong_extension",
            FeatherError::UnrecognizedHeader { .. } => "unrecognized_header",
            FeatherError::NotFound { .. } => "not_found",
            FeatherError::AlreadyLinked { .. } => "already_linked",
            FeatherError::Host { .. } => "host_error",
            FeatherError::HostExited { .. } => "host_exited",
            FeatherError::Timeout { .. } => "timeout",
            FeatherError::WouldOverwriteInput { .. } => "would_overwrite_input",
            FeatherError::Io(_) => "io_error",
            FeatherError::Json(_) => "json_error",
            FeatherError::Toml(_) => "toml_error",
            FeatherError::FailedOperationWithTarget { .. } => "failed_operation_with_target",
            FeatherError::Other(_) => "other",
            FeatherError::Interrupted => "interrupted",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type alias for feather operations
pub type Result<T> = std::result::Result<T, FeatherError>;
