//! Persisted entities: failed-call entries and processed-file markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{DecodedRecord, FailureVerdict, RecordKey};

/// Hex-encoded content digest of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines: the first 12 characters.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Projection of a failed call leg as stored.
///
/// Unique by `(call_id, origination)`; inserted once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCallEntry {
    pub call_id: String,
    pub origination: DateTime<Utc>,
    pub calling_number: String,
    pub original_called_number: String,
    pub final_called_number: String,
    pub orig_cause: u32,
    pub dest_cause: u32,
    /// Grouping key for cause histograms.
    pub primary_cause: u32,
    pub failure_reason: String,
    pub duration_secs: u32,
    pub orig_device: String,
    pub dest_device: String,
    pub orig_ip: String,
    pub dest_ip: String,
    /// Fingerprint of the file the entry was first seen in.
    pub file_fingerprint: String,
}

impl FailedCallEntry {
    /// Build the persisted projection of a record classified as failed.
    pub fn from_record(
        record: &DecodedRecord,
        verdict: &FailureVerdict,
        fingerprint: &Fingerprint,
    ) -> Self {
        FailedCallEntry {
            call_id: record.call_id.clone(),
            origination: record.origination,
            calling_number: record.calling_number.clone(),
            original_called_number: record.original_called_number.clone(),
            final_called_number: record.final_called_number.clone(),
            orig_cause: record.orig_cause_or_none().value(),
            dest_cause: record.dest_cause_or_none().value(),
            primary_cause: verdict.primary_cause_code.value(),
            failure_reason: verdict.reason.clone(),
            duration_secs: record.duration_secs,
            orig_device: record.orig_device.clone(),
            dest_device: record.dest_device.clone(),
            orig_ip: record.orig_ip.clone(),
            dest_ip: record.dest_ip.clone(),
            file_fingerprint: fingerprint.0.clone(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            call_id: self.call_id.clone(),
            origination: self.origination,
        }
    }
}

/// Marks a source file as fully processed.
///
/// Unique by filename. A marker only matches a later delivery when the
/// fingerprint is identical; changed content means reprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFileMarker {
    pub filename: String,
    pub fingerprint: Fingerprint,
    pub total_records: u64,
    pub failed_records: u64,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedFileMarker {
    pub fn new(
        filename: impl Into<String>,
        fingerprint: Fingerprint,
        total_records: u64,
        failed_records: u64,
    ) -> Self {
        ProcessedFileMarker {
            filename: filename.into(),
            fingerprint,
            total_records,
            failed_records,
            processed_at: Utc::now(),
        }
    }
}
