//! Fuzz target for config.json parsing and validation.
//!
//! Parsing and validation should never panic, only return errors.

#![no_main]

use cdr_core::config::{parse_config, validate_config};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(config) = parse_config(data) {
        let _ = validate_config(&config);
    }
});
