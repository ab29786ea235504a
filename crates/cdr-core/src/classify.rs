//! Failure classification.
//!
//! A call leg failed when it never carried media (zero duration) and either
//! side reported a cause outside the success set. Absent causes read as `0`
//! ("no error"). Codes missing from the documented failure list still count:
//! an unlisted code on a zero-duration leg is a failure.

use cdr_common::{CauseCode, DecodedRecord, FailureVerdict};

/// Classify one record. Pure; the verdict depends only on the record.
pub fn classify(record: &DecodedRecord) -> FailureVerdict {
    let orig = record.orig_cause_or_none();
    let dest = record.dest_cause_or_none();

    let is_failed = record.duration_secs == 0 && (!dest.is_success() || !orig.is_success());
    let primary = primary_cause(record);

    FailureVerdict {
        is_failed,
        reason: primary.description(),
        primary_cause_code: primary,
    }
}

/// Terminating cause if present, else originating, else `0`.
pub fn primary_cause(record: &DecodedRecord) -> CauseCode {
    record
        .dest_cause
        .or(record.orig_cause)
        .unwrap_or(CauseCode::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn record(orig: Option<u32>, dest: Option<u32>, duration_secs: u32) -> DecodedRecord {
        DecodedRecord {
            record_type: 1,
            call_id: "1-100".to_string(),
            origination: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            connect: None,
            disconnect: None,
            calling_number: "1001".to_string(),
            original_called_number: "2001".to_string(),
            final_called_number: "2001".to_string(),
            last_redirect_dn: String::new(),
            calling_partition: String::new(),
            original_called_partition: String::new(),
            final_called_partition: String::new(),
            last_redirect_partition: String::new(),
            orig_cause: orig.map(CauseCode),
            dest_cause: dest.map(CauseCode),
            duration_secs,
            orig_device: String::new(),
            dest_device: String::new(),
            orig_ip: String::new(),
            dest_ip: String::new(),
            hunt_pilot_dn: String::new(),
            hunt_pilot_partition: String::new(),
        }
    }

    #[test]
    fn test_busy_zero_duration_fails() {
        let verdict = classify(&record(None, Some(17), 0));
        assert!(verdict.is_failed);
        assert_eq!(verdict.reason, "User busy");
        assert_eq!(verdict.primary_cause_code, CauseCode(17));
    }

    #[test]
    fn test_connected_call_never_fails() {
        let verdict = classify(&record(None, Some(17), 120));
        assert!(!verdict.is_failed);
    }

    #[test]
    fn test_normal_clearing_not_failed() {
        assert!(!classify(&record(Some(16), Some(16), 0)).is_failed);
        assert!(!classify(&record(None, None, 0)).is_failed);
        assert!(!classify(&record(Some(393_216), None, 0)).is_failed);
    }

    #[test]
    fn test_originating_cause_alone_fails() {
        let verdict = classify(&record(Some(31), None, 0));
        assert!(verdict.is_failed);
        assert_eq!(verdict.primary_cause_code, CauseCode(31));
    }

    #[test]
    fn test_terminating_cause_is_primary() {
        let verdict = classify(&record(Some(31), Some(19), 0));
        assert_eq!(verdict.primary_cause_code, CauseCode(19));
        assert_eq!(verdict.reason, "No answer from user (user alerted)");
    }

    #[test]
    fn test_unlisted_code_still_fails() {
        let verdict = classify(&record(None, Some(4242), 0));
        assert!(!CauseCode(4242).is_listed_failure());
        assert!(verdict.is_failed);
        assert_eq!(verdict.reason, "Unknown cause code: 4242");
    }

    proptest! {
        #[test]
        fn prop_nonzero_duration_never_fails(
            orig in proptest::option::of(any::<u32>()),
            dest in proptest::option::of(any::<u32>()),
            duration in 1u32..=u32::MAX,
        ) {
            prop_assert!(!classify(&record(orig, dest, duration)).is_failed);
        }

        #[test]
        fn prop_zero_duration_matches_rule(
            orig in proptest::option::of(any::<u32>()),
            dest in proptest::option::of(any::<u32>()),
        ) {
            let verdict = classify(&record(orig, dest, 0));
            let success = |c: Option<u32>| CauseCode(c.unwrap_or(0)).is_success();
            prop_assert_eq!(verdict.is_failed, !success(orig) || !success(dest));
        }

        #[test]
        fn prop_reason_matches_primary(
            orig in proptest::option::of(any::<u32>()),
            dest in proptest::option::of(any::<u32>()),
        ) {
            let verdict = classify(&record(orig, dest, 0));
            prop_assert_eq!(verdict.reason, verdict.primary_cause_code.description());
        }
    }
}
