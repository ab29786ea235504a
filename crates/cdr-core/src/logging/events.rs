//! Structured event definitions for logging.
//!
//! All events carry the run correlation ID and the pipeline stage, so a
//! single run can be followed through JSONL output.

use serde::{Deserialize, Serialize};

/// Processing stages in the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Listing source files.
    Fetch,
    /// Reading and decoding CDR lines.
    Decode,
    /// Failure classification.
    Classify,
    /// Writing failed calls and file markers.
    Persist,
    /// Computing the windowed snapshot.
    Aggregate,
    /// Writing report output and artifacts.
    Report,
    /// Retention purge and artifact housekeeping.
    Sweep,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Classify => "classify",
            Stage::Persist => "persist",
            Stage::Aggregate => "aggregate",
            Stage::Report => "report",
            Stage::Sweep => "sweep",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Fetch stage
    pub const FETCH_LISTED: &str = "fetch.listed";
    pub const FETCH_SKIPPED: &str = "fetch.skipped";

    // Per-file ingestion
    pub const FILE_UNREADABLE: &str = "file.unreadable";
    pub const FILE_ALREADY_PROCESSED: &str = "file.already_processed";
    pub const FILE_DECODED: &str = "file.decoded";
    pub const FILE_COMMITTED: &str = "file.committed";

    // Reporting
    pub const SNAPSHOT_COMPUTED: &str = "aggregate.snapshot";
    pub const REPORT_WRITTEN: &str = "report.written";

    // Sweep
    pub const SWEEP_PURGED: &str = "sweep.purged";
    pub const SWEEP_ARTIFACTS: &str = "sweep.artifacts";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const STORE_ERROR: &str = "store.error";
}

/// Correlation context shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }
}
