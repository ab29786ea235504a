//! Store contract and its SQLite implementation.
//!
//! The engine only talks to [`CallStore`]. Idempotent re-ingestion rests on
//! two uniqueness rules enforced here:
//! - a failed call is keyed by `(call_id, origination)`; inserting the same
//!   key again is a silent no-op
//! - a processed-file marker is keyed by filename; it only matches a delivery
//!   whose fingerprint is identical

use std::path::Path;
use std::time::Duration as StdDuration;

use cdr_common::{AggregateSnapshot, FailedCallEntry, Fingerprint, ProcessedFileMarker};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::aggregate;
use crate::error::{Result, StoreError};
use crate::schema::{
    CREATE_SCHEMA, FAILED_CALLS_TABLE, FAILED_CALL_COLUMNS, PROCESSED_FILES_TABLE,
    STORE_SCHEMA_VERSION,
};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Insert/query contract the ingestion engine consumes.
pub trait CallStore {
    /// True when `filename` was already processed with exactly this content.
    fn is_file_processed(&self, filename: &str, fingerprint: &Fingerprint) -> Result<bool>;

    /// Record (or replace) the marker for a file.
    fn mark_file_processed(&mut self, marker: &ProcessedFileMarker) -> Result<()>;

    /// Insert one failed call. Returns `false` when the natural key already
    /// existed and nothing was written.
    fn insert_failed_call(&mut self, entry: &FailedCallEntry) -> Result<bool>;

    /// Failed calls originating at or after `cutoff`, newest first.
    fn failed_calls_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<FailedCallEntry>>;

    /// Delete failed calls originating strictly before `cutoff`.
    fn purge_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Persist a file's failed calls and its marker as one unit of work.
    ///
    /// Returns the number of entries actually inserted. Stores with real
    /// transactions should override this so a crash never leaves entries
    /// without their marker.
    fn commit_file(
        &mut self,
        marker: &ProcessedFileMarker,
        entries: &[FailedCallEntry],
    ) -> Result<usize> {
        let mut inserted = 0;
        for entry in entries {
            if self.insert_failed_call(entry)? {
                inserted += 1;
            }
        }
        self.mark_file_processed(marker)?;
        Ok(inserted)
    }

    /// Failed calls from the last `window_hours`, newest first.
    fn query_failed_calls(&self, window_hours: u32) -> Result<Vec<FailedCallEntry>> {
        self.failed_calls_since(aggregate::window_cutoff(Utc::now(), window_hours))
    }

    /// Aggregate statistics over the last `window_hours`.
    fn query_statistics(&self, window_hours: u32) -> Result<AggregateSnapshot> {
        Ok(self.query_window(window_hours)?.0)
    }

    /// Statistics and the failed calls behind them, from one cutoff.
    ///
    /// Every listed call is counted in the snapshot and vice versa, even
    /// when a call sits on the window edge.
    fn query_window(&self, window_hours: u32) -> Result<(AggregateSnapshot, Vec<FailedCallEntry>)> {
        let now = Utc::now();
        let entries = self.failed_calls_since(aggregate::window_cutoff(now, window_hours))?;
        let snapshot = aggregate::snapshot(&entries, window_hours, now);
        Ok((snapshot, entries))
    }

    /// Delete failed calls older than `retention_days`. Irreversible.
    fn purge_older_than(&mut self, retention_days: u32) -> Result<usize> {
        let cutoff = aggregate::retention_cutoff(Utc::now(), retention_days);
        let deleted = self.purge_before(cutoff)?;
        info!(
            deleted,
            retention_days,
            "Purged failed calls older than retention horizon"
        );
        Ok(deleted)
    }
}

/// SQLite-backed [`CallStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened failed-call store");
        Self::from_connection(conn)
    }

    /// In-memory store, mainly for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > STORE_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found: version,
                supported: STORE_SCHEMA_VERSION,
            });
        }
        conn.execute_batch(CREATE_SCHEMA)?;
        if version < STORE_SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", STORE_SCHEMA_VERSION)?;
        }
        Ok(SqliteStore { conn })
    }

    /// Marker currently stored for `filename`, if any.
    pub fn marker(&self, filename: &str) -> Result<Option<ProcessedFileMarker>> {
        self.conn
            .query_row(
                "SELECT filename, fingerprint, total_records, failed_records, processed_at
                 FROM processed_files WHERE filename = ?1",
                params![filename],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?
            .map(|(filename, fingerprint, total, failed, processed_at)| {
                Ok(ProcessedFileMarker {
                    filename,
                    fingerprint: Fingerprint(fingerprint),
                    total_records: total.max(0) as u64,
                    failed_records: failed.max(0) as u64,
                    processed_at: from_epoch(PROCESSED_FILES_TABLE, processed_at)?,
                })
            })
            .transpose()
    }

    /// Total number of stored failed calls, regardless of age.
    pub fn count_failed_calls(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM failed_calls", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl CallStore for SqliteStore {
    fn is_file_processed(&self, filename: &str, fingerprint: &Fingerprint) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM processed_files WHERE filename = ?1 AND fingerprint = ?2")?;
        Ok(stmt.exists(params![filename, fingerprint.as_str()])?)
    }

    fn mark_file_processed(&mut self, marker: &ProcessedFileMarker) -> Result<()> {
        upsert_marker(&self.conn, marker)
    }

    fn insert_failed_call(&mut self, entry: &FailedCallEntry) -> Result<bool> {
        insert_entry(&self.conn, entry, Utc::now())
    }

    fn failed_calls_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<FailedCallEntry>> {
        let sql = format!(
            "SELECT {FAILED_CALL_COLUMNS} FROM failed_calls
             WHERE origination >= ?1
             ORDER BY origination DESC, id DESC"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![cutoff.timestamp()], read_entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            let (entry, origination) = row?;
            entries.push(FailedCallEntry {
                origination: from_epoch(FAILED_CALLS_TABLE, origination)?,
                ..entry
            });
        }
        Ok(entries)
    }

    fn purge_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM failed_calls WHERE origination < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(deleted)
    }

    fn commit_file(
        &mut self,
        marker: &ProcessedFileMarker,
        entries: &[FailedCallEntry],
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let now = Utc::now();
        let mut inserted = 0;
        for entry in entries {
            if insert_entry(&tx, entry, now)? {
                inserted += 1;
            }
        }
        upsert_marker(&tx, marker)?;
        tx.commit()?;

        debug!(
            filename = %marker.filename,
            fingerprint = %marker.fingerprint.short(),
            inserted,
            duplicates = entries.len() - inserted,
            "Committed file"
        );
        Ok(inserted)
    }
}

fn insert_entry(conn: &Connection, entry: &FailedCallEntry, now: DateTime<Utc>) -> Result<bool> {
    let sql = format!(
        "INSERT OR IGNORE INTO failed_calls ({FAILED_CALL_COLUMNS}, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let changed = stmt.execute(params![
        entry.call_id,
        entry.origination.timestamp(),
        entry.calling_number,
        entry.original_called_number,
        entry.final_called_number,
        i64::from(entry.orig_cause),
        i64::from(entry.dest_cause),
        i64::from(entry.primary_cause),
        entry.failure_reason,
        i64::from(entry.duration_secs),
        entry.orig_device,
        entry.dest_device,
        entry.orig_ip,
        entry.dest_ip,
        entry.file_fingerprint,
        now.timestamp(),
    ])?;
    Ok(changed > 0)
}

fn upsert_marker(conn: &Connection, marker: &ProcessedFileMarker) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO processed_files (
            filename, fingerprint, total_records, failed_records, processed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(filename) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            total_records = excluded.total_records,
            failed_records = excluded.failed_records,
            processed_at = excluded.processed_at
        "#,
        params![
            marker.filename,
            marker.fingerprint.as_str(),
            saturating_i64(marker.total_records),
            saturating_i64(marker.failed_records),
            marker.processed_at.timestamp(),
        ],
    )?;
    Ok(())
}

/// Maps a row to an entry plus its raw origination seconds. The placeholder
/// origination is replaced by the caller once the seconds are validated.
fn read_entry_row(row: &Row<'_>) -> rusqlite::Result<(FailedCallEntry, i64)> {
    let origination: i64 = row.get(1)?;
    let entry = FailedCallEntry {
        call_id: row.get(0)?,
        origination: DateTime::<Utc>::default(),
        calling_number: row.get(2)?,
        original_called_number: row.get(3)?,
        final_called_number: row.get(4)?,
        orig_cause: row.get(5)?,
        dest_cause: row.get(6)?,
        primary_cause: row.get(7)?,
        failure_reason: row.get(8)?,
        duration_secs: row.get(9)?,
        orig_device: row.get(10)?,
        dest_device: row.get(11)?,
        orig_ip: row.get(12)?,
        dest_ip: row.get(13)?,
        file_fingerprint: row.get(14)?,
    };
    Ok((entry, origination))
}

fn from_epoch(table: &'static str, secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| StoreError::CorruptRow {
            table,
            message: format!("timestamp out of range: {secs}"),
        })
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(call_id: &str, origination: DateTime<Utc>, cause: u32) -> FailedCallEntry {
        FailedCallEntry {
            call_id: call_id.to_string(),
            origination,
            calling_number: "1001".to_string(),
            original_called_number: "2002".to_string(),
            final_called_number: "2002".to_string(),
            orig_cause: 0,
            dest_cause: cause,
            primary_cause: cause,
            failure_reason: cdr_common::CauseCode(cause).description(),
            duration_secs: 0,
            orig_device: "SEP0001".to_string(),
            dest_device: "SEP0002".to_string(),
            orig_ip: "10.0.0.1".to_string(),
            dest_ip: "10.0.0.2".to_string(),
            file_fingerprint: "fp".to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_schema_version_recorded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let version: i64 = store
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, STORE_SCHEMA_VERSION);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let e = entry("1-100", at(1_700_000_000), 17);

        assert!(store.insert_failed_call(&e).unwrap());
        assert!(!store.insert_failed_call(&e).unwrap());
        assert_eq!(store.count_failed_calls().unwrap(), 1);
    }

    #[test]
    fn test_same_call_id_different_origination_is_distinct() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(store
            .insert_failed_call(&entry("1-100", at(1_700_000_000), 17))
            .unwrap());
        assert!(store
            .insert_failed_call(&entry("1-100", at(1_700_000_060), 17))
            .unwrap());
        assert_eq!(store.count_failed_calls().unwrap(), 2);
    }

    #[test]
    fn test_marker_matches_only_same_fingerprint() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let fp = Fingerprint("aaaa".to_string());
        store
            .mark_file_processed(&ProcessedFileMarker::new("cdr_a", fp.clone(), 10, 2))
            .unwrap();

        assert!(store.is_file_processed("cdr_a", &fp).unwrap());
        assert!(!store
            .is_file_processed("cdr_a", &Fingerprint("bbbb".to_string()))
            .unwrap());
        assert!(!store.is_file_processed("cdr_b", &fp).unwrap());
    }

    #[test]
    fn test_marker_replaced_on_reprocess() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .mark_file_processed(&ProcessedFileMarker::new(
                "cdr_a",
                Fingerprint("old".to_string()),
                10,
                2,
            ))
            .unwrap();
        store
            .mark_file_processed(&ProcessedFileMarker::new(
                "cdr_a",
                Fingerprint("new".to_string()),
                12,
                3,
            ))
            .unwrap();

        let marker = store.marker("cdr_a").unwrap().unwrap();
        assert_eq!(marker.fingerprint.as_str(), "new");
        assert_eq!(marker.total_records, 12);
        assert_eq!(marker.failed_records, 3);
        assert!(store.marker("cdr_missing").unwrap().is_none());
    }

    #[test]
    fn test_commit_file_counts_inserted_only() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let existing = entry("1-100", at(1_700_000_000), 17);
        store.insert_failed_call(&existing).unwrap();

        let marker = ProcessedFileMarker::new("cdr_a", Fingerprint("fp".to_string()), 5, 2);
        let inserted = store
            .commit_file(
                &marker,
                &[existing.clone(), entry("1-200", at(1_700_000_100), 19)],
            )
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.count_failed_calls().unwrap(), 2);
        assert!(store.is_file_processed("cdr_a", &marker.fingerprint).unwrap());
    }

    #[test]
    fn test_failed_calls_since_orders_newest_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_failed_call(&entry("a", at(1_000), 17)).unwrap();
        store.insert_failed_call(&entry("b", at(3_000), 17)).unwrap();
        store.insert_failed_call(&entry("c", at(2_000), 17)).unwrap();

        let rows = store.failed_calls_since(at(1_500)).unwrap();
        let ids: Vec<_> = rows.iter().map(|e| e.call_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(rows[0].origination, at(3_000));
        assert_eq!(rows[0].failure_reason, "User busy");
    }

    #[test]
    fn test_purge_before_is_strict() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_failed_call(&entry("old", at(999), 17)).unwrap();
        store.insert_failed_call(&entry("edge", at(1_000), 17)).unwrap();
        store.insert_failed_call(&entry("new", at(1_001), 17)).unwrap();

        let deleted = store.purge_before(at(1_000)).unwrap();
        assert_eq!(deleted, 1);

        let remaining: Vec<_> = store
            .failed_calls_since(at(0))
            .unwrap()
            .into_iter()
            .map(|e| e.call_id)
            .collect();
        assert_eq!(remaining, vec!["new".to_string(), "edge".to_string()]);
    }

    #[test]
    fn test_retention_cutoff_with_fractional_now() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_failed_call(&entry("old", at(999), 17)).unwrap();
        store.insert_failed_call(&entry("edge", at(1_000), 17)).unwrap();

        let now = Utc.timestamp_opt(1_000 + 7 * 86_400, 900_000_000).unwrap();
        let cutoff = aggregate::retention_cutoff(now, 7);
        assert_eq!(cutoff, at(1_000));

        assert_eq!(store.purge_before(cutoff).unwrap(), 1);
        let remaining = store.failed_calls_since(at(0)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|e| e.origination >= cutoff));
    }

    #[test]
    fn test_sql_window_agrees_with_snapshot_on_edge() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_failed_call(&entry("before", at(9_999), 17)).unwrap();
        store.insert_failed_call(&entry("edge", at(10_000), 17)).unwrap();
        store.insert_failed_call(&entry("inside", at(11_000), 19)).unwrap();

        let now = Utc.timestamp_opt(10_000 + 3600, 250_000_000).unwrap();
        let rows = store
            .failed_calls_since(aggregate::window_cutoff(now, 1))
            .unwrap();
        let snap = aggregate::snapshot(&rows, 1, now);

        assert_eq!(rows.len(), 2);
        assert_eq!(snap.total_failed_calls, rows.len() as u64);
    }

    #[test]
    fn test_query_window_lists_what_it_counts() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .insert_failed_call(&entry("a", now - chrono::Duration::minutes(5), 17))
            .unwrap();
        store
            .insert_failed_call(&entry("b", now - chrono::Duration::hours(2), 19))
            .unwrap();
        store
            .insert_failed_call(&entry("c", now - chrono::Duration::hours(30), 1))
            .unwrap();

        let (snap, calls) = store.query_window(24).unwrap();
        assert_eq!(snap.total_failed_calls, calls.len() as u64);
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.origination >= snap.cutoff_time));
    }
}
