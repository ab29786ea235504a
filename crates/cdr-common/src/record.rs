//! Decoded call-leg records.
//!
//! A [`DecodedRecord`] is produced exactly once per accepted CDR line and is
//! never modified afterwards. Values that the raw format encodes as zero or
//! empty ("absent") are `None` here, so a zero duration stays distinguishable
//! from a missing timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cause::CauseCode;

/// Record-type tag identifying a call-leg row. Other tags are ignored.
pub const CALL_LEG_RECORD_TYPE: u32 = 1;

/// One physical call leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub record_type: u32,
    /// `<cluster id>-<call id>`.
    pub call_id: String,
    pub origination: DateTime<Utc>,
    pub connect: Option<DateTime<Utc>>,
    pub disconnect: Option<DateTime<Utc>>,

    pub calling_number: String,
    pub original_called_number: String,
    pub final_called_number: String,
    pub last_redirect_dn: String,

    pub calling_partition: String,
    pub original_called_partition: String,
    pub final_called_partition: String,
    pub last_redirect_partition: String,

    /// Cause reported by the originating side.
    pub orig_cause: Option<CauseCode>,
    /// Cause reported by the terminating side.
    pub dest_cause: Option<CauseCode>,
    pub duration_secs: u32,

    pub orig_device: String,
    pub dest_device: String,
    pub orig_ip: String,
    pub dest_ip: String,

    pub hunt_pilot_dn: String,
    pub hunt_pilot_partition: String,
}

impl DecodedRecord {
    /// Natural key used for row-level deduplication.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            call_id: self.call_id.clone(),
            origination: self.origination,
        }
    }

    /// Originating cause, with absence read as "no error".
    pub fn orig_cause_or_none(&self) -> CauseCode {
        self.orig_cause.unwrap_or(CauseCode::NONE)
    }

    /// Terminating cause, with absence read as "no error".
    pub fn dest_cause_or_none(&self) -> CauseCode {
        self.dest_cause.unwrap_or(CauseCode::NONE)
    }
}

/// Natural key of a call leg: the same leg delivered in two files maps to
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub call_id: String,
    pub origination: DateTime<Utc>,
}

/// Derived failure status for a record. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureVerdict {
    pub is_failed: bool,
    pub reason: String,
    pub primary_cause_code: CauseCode,
}
