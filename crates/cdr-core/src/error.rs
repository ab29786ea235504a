//! Error types for the triage engine.
//!
//! Every error carries:
//! - a category for grouping
//! - a recoverability hint for schedulers
//! - the stable exit code the CLI terminates with
//!
//! Agent-facing output serializes through [`Error::to_json`]:
//! ```json
//! {
//!   "code": 22,
//!   "category": "store",
//!   "message": "store failure: SQLite error: database is locked",
//!   "recoverable": true
//! }
//! ```

use std::path::PathBuf;

use cdr_store::{RetentionError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::exit_codes::ExitCode;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration loading and validation.
    Config,
    /// Source files and the inbox.
    Input,
    /// The failed-call store.
    Store,
    /// Report artifacts and their retention.
    Report,
    /// Invalid invocation.
    Usage,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Report => write!(f, "report"),
            ErrorCategory::Usage => write!(f, "usage"),
        }
    }
}

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("inbox not readable: {path}: {source}")]
    Inbox {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write report artifact {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact retention failed: {0}")]
    Retention(#[from] RetentionError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Store(_) => ErrorCategory::Store,
            Error::Inbox { .. } | Error::Io(_) => ErrorCategory::Input,
            Error::ReportWrite { .. } | Error::Retention(_) | Error::Json(_) => {
                ErrorCategory::Report
            }
            Error::InvalidArgument(_) => ErrorCategory::Usage,
        }
    }

    /// Whether re-running later (or after fixing input) may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => true,
            Error::Store(StoreError::Sqlite(_)) | Error::Store(StoreError::Io(_)) => true,
            Error::Store(_) => false,
            Error::Inbox { .. } | Error::ReportWrite { .. } | Error::Io(_) => true,
            Error::Retention(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Exit code the CLI terminates with for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Config(e) => e.exit_code(),
            Error::Store(_) => ExitCode::StoreError,
            Error::Inbox { .. } | Error::ReportWrite { .. } | Error::Io(_) => ExitCode::IoError,
            Error::Retention(RetentionError::Io(_)) => ExitCode::IoError,
            Error::Retention(_) | Error::Json(_) => ExitCode::InternalError,
            Error::InvalidArgument(_) => ExitCode::ArgsError,
        }
    }

    /// Structured form for JSON error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.exit_code().as_i32(),
            "code_name": self.exit_code().code_name(),
            "category": self.category(),
            "message": self.to_string(),
            "recoverable": self.is_recoverable(),
        })
    }
}
