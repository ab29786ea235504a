//! File ingestion pipeline.
//!
//! For each delivered file: fingerprint, skip if already processed with the
//! same content, decode, classify, then commit the failed calls and the file
//! marker as one unit of work. A file that cannot be read is skipped without
//! a marker so the next run retries it. Store failures abort the run.

use std::path::{Path, PathBuf};

use cdr_common::{FailedCallEntry, ProcessedFileMarker};
use cdr_store::CallStore;
use serde::{Deserialize, Serialize};

use crate::classify::classify;
use crate::decode::decode_path;
use crate::error::Result;
use crate::fields::SchemaVersion;
use crate::fingerprint::fingerprint_path;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_seen: u64,
    pub files_processed: u64,
    /// Same name and content as an earlier run.
    pub files_skipped_duplicate: u64,
    pub files_unreadable: u64,
    /// Call-leg records decoded across processed files.
    pub records_processed: u64,
    /// Failed calls written to the store (duplicates by key excluded).
    pub new_failed_calls: u64,
    /// Lines skipped by the decoder.
    pub lines_skipped: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<PathBuf>,
}

impl RunSummary {
    fn absorb(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Duplicate => self.files_skipped_duplicate += 1,
            FileOutcome::Committed {
                records,
                inserted,
                skipped_lines,
            } => {
                self.files_processed += 1;
                self.records_processed += records;
                self.new_failed_calls += inserted;
                self.lines_skipped += skipped_lines;
            }
        }
    }
}

enum FileOutcome {
    Duplicate,
    Committed {
        records: u64,
        inserted: u64,
        skipped_lines: u64,
    },
}

/// Ingest `paths` in order.
pub fn ingest_files<S, P>(store: &mut S, paths: &[P], ctx: &LogContext) -> Result<RunSummary>
where
    S: CallStore + ?Sized,
    P: AsRef<Path>,
{
    let mut summary = RunSummary::default();

    for path in paths {
        let path = path.as_ref();
        summary.files_seen += 1;
        match ingest_file(store, path, ctx)? {
            Some(outcome) => summary.absorb(outcome),
            None => {
                summary.files_unreadable += 1;
                summary.unreadable.push(path.to_path_buf());
            }
        }
    }

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Persist,
        "Ingestion finished",
        files = summary.files_seen,
        processed = summary.files_processed,
        duplicates = summary.files_skipped_duplicate,
        unreadable = summary.files_unreadable,
        records = summary.records_processed,
        new_failed_calls = summary.new_failed_calls
    );

    Ok(summary)
}

/// `Ok(None)` when the file could not be read.
fn ingest_file<S>(store: &mut S, path: &Path, ctx: &LogContext) -> Result<Option<FileOutcome>>
where
    S: CallStore + ?Sized,
{
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let fingerprint = match fingerprint_path(path) {
        Ok(fp) => fp,
        Err(e) => {
            log_event!(
                ctx,
                WARN,
                event_names::FILE_UNREADABLE,
                Stage::Decode,
                "Cannot read CDR file, skipping",
                file = %filename,
                error = %e
            );
            return Ok(None);
        }
    };

    if store.is_file_processed(&filename, &fingerprint)? {
        log_event!(
            ctx,
            DEBUG,
            event_names::FILE_ALREADY_PROCESSED,
            Stage::Persist,
            "File already processed, skipping",
            file = %filename,
            fingerprint = %fingerprint.short()
        );
        return Ok(Some(FileOutcome::Duplicate));
    }

    let outcome = match decode_path(path, SchemaVersion::V1) {
        Ok(outcome) => outcome,
        Err(e) => {
            log_event!(
                ctx,
                WARN,
                event_names::FILE_UNREADABLE,
                Stage::Decode,
                "Cannot decode CDR file, skipping",
                file = %filename,
                error = %e
            );
            return Ok(None);
        }
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::FILE_DECODED,
        Stage::Decode,
        "Decoded CDR file",
        file = %filename,
        lines = outcome.lines_scanned,
        records = outcome.records.len(),
        skipped = outcome.skipped()
    );

    let entries: Vec<FailedCallEntry> = outcome
        .records
        .iter()
        .filter_map(|record| {
            let verdict = classify(record);
            verdict
                .is_failed
                .then(|| FailedCallEntry::from_record(record, &verdict, &fingerprint))
        })
        .collect();

    let records = outcome.records.len() as u64;
    let marker = ProcessedFileMarker::new(
        filename.clone(),
        fingerprint,
        records,
        entries.len() as u64,
    );
    let inserted = store.commit_file(&marker, &entries)? as u64;

    log_event!(
        ctx,
        INFO,
        event_names::FILE_COMMITTED,
        Stage::Persist,
        "Processed CDR file",
        file = %filename,
        records = records,
        failed = entries.len(),
        inserted = inserted
    );

    Ok(Some(FileOutcome::Committed {
        records,
        inserted,
        skipped_lines: outcome.skipped(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_store::SqliteStore;
    use std::fs;
    use tempfile::TempDir;

    fn line(call_id: u32, origination: i64, dest_cause: u32, duration: u32) -> String {
        let mut fields = vec![String::new(); 60];
        fields[0] = "1".to_string();
        fields[2] = call_id.to_string();
        fields[4] = origination.to_string();
        fields[8] = "1001".to_string();
        fields[11] = "0".to_string();
        fields[29] = "2001".to_string();
        fields[30] = "2001".to_string();
        fields[33] = dest_cause.to_string();
        fields[55] = duration.to_string();
        fields.join(",")
    }

    fn ctx() -> LogContext {
        LogContext::new("run-test", "host-test")
    }

    #[test]
    fn test_unreadable_file_counted_without_marker() {
        let tmp = TempDir::new().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let missing = tmp.path().join("cdr_missing");

        let summary = ingest_files(&mut store, &[missing], &ctx()).unwrap();
        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.files_unreadable, 1);
        assert_eq!(summary.files_processed, 0);
        assert!(store.marker("cdr_missing").unwrap().is_none());
    }

    #[test]
    fn test_only_failed_calls_persisted() {
        let tmp = TempDir::new().unwrap();
        let now = chrono::Utc::now().timestamp();
        let body = [
            line(1, now - 60, 17, 0),
            line(2, now - 50, 16, 120),
            "1,2,3".to_string(),
        ]
        .join("\n");
        let path = tmp.path().join("cdr_a");
        fs::write(&path, body).unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        let summary = ingest_files(&mut store, &[&path], &ctx()).unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.records_processed, 2);
        assert_eq!(summary.new_failed_calls, 1);
        assert_eq!(summary.lines_skipped, 1);

        let marker = store.marker("cdr_a").unwrap().unwrap();
        assert_eq!(marker.total_records, 2);
        assert_eq!(marker.failed_records, 1);
    }
}
