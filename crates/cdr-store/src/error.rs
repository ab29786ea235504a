//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur while reading or writing the failed-call store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database was created by a newer schema
    #[error("unsupported store schema version: {found} (supported: {supported})")]
    UnsupportedSchema { found: i64, supported: i64 },

    /// A stored row could not be mapped back into a typed entity
    #[error("corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
