//! Fuzz target for whole-file decoding and classification.
//!
//! Arbitrary bytes, including invalid UTF-8, must decode without panicking,
//! and every line must be accounted for as a record or a skip.

#![no_main]

use cdr_core::classify::classify;
use cdr_core::decode::decode_reader;
use cdr_core::fields::SchemaVersion;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(outcome) = decode_reader(data, SchemaVersion::V1) else {
        return;
    };
    assert_eq!(
        outcome.records.len() as u64 + outcome.skipped(),
        outcome.lines_scanned
    );

    for record in &outcome.records {
        // Classification is total over decoded records.
        let _ = classify(record);
    }
});
