//! Fuzz target for CDR line splitting.
//!
//! Tests that `split_line` handles arbitrary input without panicking and
//! that unquoted input splits exactly like a plain comma split.

#![no_main]

use cdr_core::decode::split_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let fields = split_line(data);
    if data.is_empty() {
        assert!(fields.is_empty());
        return;
    }

    if !data.contains('"') && !data.contains('\n') && !data.contains('\r') {
        assert_eq!(fields.len(), data.split(',').count());
    }
});
