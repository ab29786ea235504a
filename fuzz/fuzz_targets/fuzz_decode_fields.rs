//! Fuzz target for field-level decoding.
//!
//! Builds a structured row so the fuzzer spends its time on field values
//! rather than on reaching the minimum field count.

#![no_main]

use arbitrary::Arbitrary;
use cdr_common::CALL_LEG_RECORD_TYPE;
use cdr_core::classify::classify;
use cdr_core::decode::decode_fields;
use cdr_core::fields::SchemaVersion;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Row {
    width: u8,
    values: Vec<(u8, String)>,
}

fuzz_target!(|row: Row| {
    let width = 50 + usize::from(row.width);
    let mut fields = vec![String::new(); width];
    fields[0] = CALL_LEG_RECORD_TYPE.to_string();
    for (slot, value) in row.values {
        let slot = usize::from(slot) % width;
        fields[slot] = value;
    }

    if let Ok(record) = decode_fields(&fields, SchemaVersion::V1) {
        let verdict = classify(&record);
        if verdict.is_failed {
            assert_eq!(record.duration_secs, 0);
        }
    }
});
