//! CDR record decoder.
//!
//! Turns raw file bytes into [`DecodedRecord`]s. Each physical line is split
//! into fields (comma delimited, double-quote aware) and decoded in one step.
//! Rows that are not call legs, or that fail field-level decoding, are skipped
//! and counted; nothing a single line contains can abort a file.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use cdr_common::{CauseCode, DecodedRecord, CALL_LEG_RECORD_TYPE};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::trace;

use crate::fields::{FieldName, SchemaVersion, MIN_FIELD_COUNT};

/// Why a line produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than [`MIN_FIELD_COUNT`] fields.
    TooShort { fields: usize },
    /// Header, start/stop marker, or any non call-leg row.
    RecordType { tag: i64 },
    /// A field value could not be decoded.
    Invalid { field: FieldName, value: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooShort { fields } => write!(f, "only {fields} fields"),
            SkipReason::RecordType { tag } => write!(f, "record type {tag}"),
            SkipReason::Invalid { field, value } => {
                write!(f, "invalid {}: {:?}", field.column_name(), value)
            }
        }
    }
}

/// Records decoded from one input, plus per-reason skip counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodeOutcome {
    #[serde(skip)]
    pub records: Vec<DecodedRecord>,
    pub lines_scanned: u64,
    pub skipped_short: u64,
    pub skipped_record_type: u64,
    pub skipped_invalid: u64,
}

impl DecodeOutcome {
    pub fn skipped(&self) -> u64 {
        self.skipped_short + self.skipped_record_type + self.skipped_invalid
    }

    fn count_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::TooShort { .. } => self.skipped_short += 1,
            SkipReason::RecordType { .. } => self.skipped_record_type += 1,
            SkipReason::Invalid { .. } => self.skipped_invalid += 1,
        }
    }
}

/// Split one physical line into fields.
///
/// Commas delimit fields. A field starting with `"` runs to the matching
/// closing quote, and `""` inside it is a literal quote. A trailing `\r\n` or
/// `\n` is dropped. An empty line yields no fields.
pub fn split_line(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    if line.is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut current)),
                '"' => in_quotes = true,
                _ => current.push(c),
            }
        }
    }
    fields.push(current);
    fields
}

/// Decode already-split fields into a record.
pub fn decode_fields<S: AsRef<str>>(
    fields: &[S],
    schema: SchemaVersion,
) -> Result<DecodedRecord, SkipReason> {
    if fields.len() < MIN_FIELD_COUNT {
        return Err(SkipReason::TooShort {
            fields: fields.len(),
        });
    }

    let tag = schema.field_value_as_int(fields, FieldName::RecordType, 0);
    if tag != i64::from(CALL_LEG_RECORD_TYPE) {
        return Err(SkipReason::RecordType { tag });
    }

    let text = |name: FieldName| schema.field_value(fields, name).to_string();
    let invalid = |name: FieldName| SkipReason::Invalid {
        field: name,
        value: schema.field_value(fields, name).to_string(),
    };

    let origination = epoch(schema.field_value(fields, FieldName::Origination))
        .ok_or_else(|| invalid(FieldName::Origination))?;

    let duration = schema.field_value_as_int(fields, FieldName::Duration, 0);
    let duration_secs = u32::try_from(duration).map_err(|_| invalid(FieldName::Duration))?;

    let orig_cause =
        cause(schema, fields, FieldName::OrigCause).map_err(|_| invalid(FieldName::OrigCause))?;
    let dest_cause =
        cause(schema, fields, FieldName::DestCause).map_err(|_| invalid(FieldName::DestCause))?;

    Ok(DecodedRecord {
        record_type: CALL_LEG_RECORD_TYPE,
        call_id: format!(
            "{}-{}",
            schema.field_value(fields, FieldName::ClusterId),
            schema.field_value(fields, FieldName::CallId)
        ),
        origination,
        connect: epoch(schema.field_value(fields, FieldName::Connect)),
        disconnect: epoch(schema.field_value(fields, FieldName::Disconnect)),
        calling_number: text(FieldName::CallingNumber),
        original_called_number: text(FieldName::OriginalCalledNumber),
        final_called_number: text(FieldName::FinalCalledNumber),
        last_redirect_dn: text(FieldName::LastRedirectDn),
        calling_partition: text(FieldName::CallingPartition),
        original_called_partition: text(FieldName::OriginalCalledPartition),
        final_called_partition: text(FieldName::FinalCalledPartition),
        last_redirect_partition: text(FieldName::LastRedirectPartition),
        orig_cause,
        dest_cause,
        duration_secs,
        orig_device: text(FieldName::OrigDevice),
        dest_device: text(FieldName::DestDevice),
        orig_ip: text(FieldName::OrigIp),
        dest_ip: text(FieldName::DestIp),
        hunt_pilot_dn: text(FieldName::HuntPilotDn),
        hunt_pilot_partition: text(FieldName::HuntPilotPartition),
    })
}

/// Decode one physical line.
pub fn decode_line(line: &str, schema: SchemaVersion) -> Result<DecodedRecord, SkipReason> {
    decode_fields(&split_line(line), schema)
}

/// Decode every line of `reader`, consuming it once.
///
/// Invalid UTF-8 is replaced rather than rejected. Only an I/O error from the
/// reader itself is returned as an error.
pub fn decode_reader<R: BufRead>(
    mut reader: R,
    schema: SchemaVersion,
) -> io::Result<DecodeOutcome> {
    let mut outcome = DecodeOutcome::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        outcome.lines_scanned += 1;

        let line = String::from_utf8_lossy(&buf);
        match decode_line(&line, schema) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                trace!(line = outcome.lines_scanned, %reason, "Skipped CDR line");
                outcome.count_skip(&reason);
            }
        }
    }

    Ok(outcome)
}

/// Open and decode a file.
pub fn decode_path(path: &Path, schema: SchemaVersion) -> io::Result<DecodeOutcome> {
    let file = File::open(path)?;
    decode_reader(BufReader::new(file), schema)
}

/// Epoch seconds; `0`, negative, or unparsable means absent.
fn epoch(raw: &str) -> Option<DateTime<Utc>> {
    match raw.parse::<i64>() {
        Ok(secs) if secs > 0 => Utc.timestamp_opt(secs, 0).single(),
        _ => None,
    }
}

/// Cause value; empty, unparsable, or `0` means absent. Negative or
/// out-of-range values are an error.
fn cause<S: AsRef<str>>(
    schema: SchemaVersion,
    fields: &[S],
    name: FieldName,
) -> Result<Option<CauseCode>, std::num::TryFromIntError> {
    let value = schema.field_value_as_int(fields, name, 0);
    let code = u32::try_from(value)?;
    Ok((code != 0).then_some(CauseCode(code)))
}
