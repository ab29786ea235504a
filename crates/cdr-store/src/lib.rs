//! Persistence for CDR failed-call triage.
//!
//! - [`store`]: the [`CallStore`] contract and its SQLite implementation
//! - [`aggregate`]: windowed statistics over stored failed calls
//! - [`retention`]: TTL enforcement for report artifacts

pub mod aggregate;
pub mod error;
pub mod retention;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use retention::{RetentionConfig, RetentionEnforcer, RetentionError, RetentionEvent};
pub use store::{CallStore, SqliteStore};
