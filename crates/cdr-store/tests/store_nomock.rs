//! No-mock store tests against a real on-disk SQLite database.
//!
//! Validates:
//! - Markers and failed calls survive reopening the database
//! - Re-committing the same file collapses to the original rows
//! - Windowed statistics and retention purge over persisted data

use cdr_common::{CauseCode, FailedCallEntry, Fingerprint, ProcessedFileMarker};
use cdr_store::{CallStore, SqliteStore};
use chrono::{Duration, Utc};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn failed_call(call_id: &str, hours_ago: i64, caller: &str, cause: u32) -> FailedCallEntry {
    FailedCallEntry {
        call_id: call_id.to_string(),
        origination: Utc::now() - Duration::hours(hours_ago) - Duration::minutes(1),
        calling_number: caller.to_string(),
        original_called_number: "5551000".to_string(),
        final_called_number: "5551000".to_string(),
        orig_cause: 0,
        dest_cause: cause,
        primary_cause: cause,
        failure_reason: CauseCode(cause).description(),
        duration_secs: 0,
        orig_device: "SEP00AABBCCDD01".to_string(),
        dest_device: "SEP00AABBCCDD02".to_string(),
        orig_ip: "10.10.0.5".to_string(),
        dest_ip: "10.10.0.6".to_string(),
        file_fingerprint: "f00d".to_string(),
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn commit_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("cdr.db");
    let fp = Fingerprint("f00d".to_string());

    {
        let mut store = SqliteStore::open(&db).unwrap();
        let marker = ProcessedFileMarker::new("cdr_StandAloneCluster_01", fp.clone(), 3, 2);
        let inserted = store
            .commit_file(
                &marker,
                &[failed_call("1-1", 1, "1001", 17), failed_call("1-2", 2, "1002", 1)],
            )
            .unwrap();
        assert_eq!(inserted, 2);
    }

    let store = SqliteStore::open(&db).unwrap();
    assert!(store.is_file_processed("cdr_StandAloneCluster_01", &fp).unwrap());
    assert_eq!(store.count_failed_calls().unwrap(), 2);

    let marker = store.marker("cdr_StandAloneCluster_01").unwrap().unwrap();
    assert_eq!(marker.total_records, 3);
    assert_eq!(marker.failed_records, 2);
}

#[test]
fn recommit_same_file_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("cdr.db")).unwrap();
    let entries = vec![failed_call("1-1", 1, "1001", 17), failed_call("1-2", 1, "1002", 17)];
    let marker = ProcessedFileMarker::new("cdr_a", Fingerprint("aa".to_string()), 2, 2);

    assert_eq!(store.commit_file(&marker, &entries).unwrap(), 2);
    assert_eq!(store.commit_file(&marker, &entries).unwrap(), 0);
    assert_eq!(store.count_failed_calls().unwrap(), 2);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_statistics_over_window() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    for (i, cause) in [17, 17, 17, 1].iter().enumerate() {
        store
            .insert_failed_call(&failed_call(&format!("1-{i}"), 1, "1001", *cause))
            .unwrap();
    }
    // Outside a 24h window.
    store
        .insert_failed_call(&failed_call("1-old", 30, "1001", 17))
        .unwrap();

    let snap = store.query_statistics(24).unwrap();
    assert_eq!(snap.total_failed_calls, 4);
    assert_eq!(snap.analysis_period_hours, 24);
    assert_eq!(snap.by_cause[0].code, 17);
    assert_eq!(snap.by_cause[0].count, 3);
    assert!((snap.by_cause[0].percentage - 75.0).abs() < 1e-9);
    assert_eq!(snap.top_callers[0].key, "1001");
    assert_eq!(snap.top_callers[0].count, 4);

    let calls = store.query_failed_calls(24).unwrap();
    assert_eq!(calls.len(), 4);
    assert!(calls.windows(2).all(|w| w[0].origination >= w[1].origination));
}

#[test]
fn query_statistics_empty_store() {
    let store = SqliteStore::open_in_memory().unwrap();
    let snap = store.query_statistics(24).unwrap();
    assert!(snap.is_empty());
    assert!(snap.by_cause.is_empty());
}

// ============================================================================
// Retention
// ============================================================================

#[test]
fn purge_older_than_removes_only_expired() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store
        .insert_failed_call(&failed_call("1-recent", 24, "1001", 17))
        .unwrap();
    store
        .insert_failed_call(&failed_call("1-expired", 8 * 24, "1001", 17))
        .unwrap();

    let deleted = store.purge_older_than(7).unwrap();
    assert_eq!(deleted, 1);

    let remaining = store.query_failed_calls(24 * 30).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].call_id, "1-recent");
}

#[test]
fn forwarded_calls_rank_by_dialed_number() {
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("cdr.db")).unwrap();

    // Dialed 5550100, forwarded to voicemail pilot 7000.
    let forwarded = |call_id: &str, dialed: &str| FailedCallEntry {
        original_called_number: dialed.to_string(),
        final_called_number: "7000".to_string(),
        ..failed_call(call_id, 1, "1001", 19)
    };
    let marker = ProcessedFileMarker::new("cdr_fwd", Fingerprint("fwd".to_string()), 3, 3);
    store
        .commit_file(
            &marker,
            &[
                forwarded("1-a", "5550100"),
                forwarded("1-b", "5550100"),
                forwarded("1-c", "5550200"),
            ],
        )
        .unwrap();

    let (snap, calls) = store.query_window(24).unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].final_called_number, "7000");

    let keys: Vec<(&str, u64)> = snap
        .top_destinations
        .iter()
        .map(|r| (r.key.as_str(), r.count))
        .collect();
    assert_eq!(keys, vec![("5550100", 2), ("5550200", 1)]);
}
