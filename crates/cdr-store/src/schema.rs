//! SQLite schema for the failed-call store.
//!
//! Two tables:
//! - `failed_calls`: one row per failed call leg, unique on
//!   `(call_id, origination)` so repeated deliveries collapse to one row.
//! - `processed_files`: one marker per source filename, with the content
//!   fingerprint that was processed.
//!
//! Timestamps are stored as epoch seconds (UTC) so that window and retention
//! comparisons are plain integer comparisons.

/// Schema version recorded in `PRAGMA user_version`.
pub const STORE_SCHEMA_VERSION: i64 = 1;

/// Table names.
pub const FAILED_CALLS_TABLE: &str = "failed_calls";
pub const PROCESSED_FILES_TABLE: &str = "processed_files";

pub(crate) const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS failed_calls (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    call_id                 TEXT    NOT NULL,
    origination             INTEGER NOT NULL,
    calling_number          TEXT    NOT NULL DEFAULT '',
    original_called_number  TEXT    NOT NULL DEFAULT '',
    final_called_number     TEXT    NOT NULL DEFAULT '',
    orig_cause              INTEGER NOT NULL DEFAULT 0,
    dest_cause              INTEGER NOT NULL DEFAULT 0,
    primary_cause           INTEGER NOT NULL DEFAULT 0,
    failure_reason          TEXT    NOT NULL DEFAULT '',
    duration                INTEGER NOT NULL DEFAULT 0,
    orig_device             TEXT    NOT NULL DEFAULT '',
    dest_device             TEXT    NOT NULL DEFAULT '',
    orig_ip                 TEXT    NOT NULL DEFAULT '',
    dest_ip                 TEXT    NOT NULL DEFAULT '',
    file_fingerprint        TEXT    NOT NULL DEFAULT '',
    created_at              INTEGER NOT NULL,
    UNIQUE(call_id, origination)
);

CREATE INDEX IF NOT EXISTS idx_failed_calls_origination
    ON failed_calls(origination);

CREATE INDEX IF NOT EXISTS idx_failed_calls_primary_cause
    ON failed_calls(primary_cause);

CREATE TABLE IF NOT EXISTS processed_files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    filename        TEXT    NOT NULL UNIQUE,
    fingerprint     TEXT    NOT NULL,
    total_records   INTEGER NOT NULL DEFAULT 0,
    failed_records  INTEGER NOT NULL DEFAULT 0,
    processed_at    INTEGER NOT NULL
);
"#;

pub(crate) const FAILED_CALL_COLUMNS: &str = "call_id, origination, calling_number, \
     original_called_number, final_called_number, orig_cause, dest_cause, primary_cause, \
     failure_reason, duration, orig_device, dest_device, orig_ip, dest_ip, file_fingerprint";
