//! Shared types for CDR failed-call triage.
//!
//! This crate provides the data model shared by the store and the core engine:
//! - Decoded call-leg records and failure verdicts
//! - Persisted failed-call entries and processed-file markers
//! - Aggregate snapshot types handed to reporting
//! - The Q.931 / Cisco cause-code table
//! - Output format specifications

pub mod cause;
pub mod entry;
pub mod output;
pub mod record;
pub mod stats;

pub use cause::{CauseCode, SUCCESS_CODES};
pub use entry::{FailedCallEntry, Fingerprint, ProcessedFileMarker};
pub use output::OutputFormat;
pub use record::{DecodedRecord, FailureVerdict, RecordKey, CALL_LEG_RECORD_TYPE};
pub use stats::{AggregateSnapshot, CauseBucket, HourBucket, RankEntry, TOP_N};

/// Schema version for serialized payloads (reports, snapshots, markers).
pub const SCHEMA_VERSION: &str = "1.0.0";
