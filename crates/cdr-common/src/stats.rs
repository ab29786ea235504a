//! Aggregate snapshot types.
//!
//! A snapshot is a read-only view computed on demand over failed-call entries
//! in a time window. It is handed to reporting as plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of entries in each top-N ranking.
pub const TOP_N: usize = 10;

/// Failure counts for one primary cause code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseBucket {
    pub code: u32,
    pub reason: String,
    pub count: u64,
    /// Share of all failed calls in the window, 0-100.
    pub percentage: f64,
}

/// Failure count for one clock hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    /// Start of the hour (UTC).
    pub hour: DateTime<Utc>,
    pub count: u64,
}

impl HourBucket {
    /// Label in `YYYY-MM-DD HH:00` form.
    pub fn label(&self) -> String {
        self.hour.format("%Y-%m-%d %H:00").to_string()
    }
}

/// One row of a top-N ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub key: String,
    pub count: u64,
}

/// Aggregate statistics over failed calls in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub total_failed_calls: u64,
    /// Ordered by count descending.
    pub by_cause: Vec<CauseBucket>,
    /// Ordered chronologically.
    pub by_hour: Vec<HourBucket>,
    pub top_callers: Vec<RankEntry>,
    pub top_destinations: Vec<RankEntry>,
    pub top_devices: Vec<RankEntry>,
    pub analysis_period_hours: u32,
    pub cutoff_time: DateTime<Utc>,
}

impl AggregateSnapshot {
    /// Snapshot of an empty window.
    pub fn empty(analysis_period_hours: u32, cutoff_time: DateTime<Utc>) -> Self {
        AggregateSnapshot {
            total_failed_calls: 0,
            by_cause: Vec::new(),
            by_hour: Vec::new(),
            top_callers: Vec::new(),
            top_destinations: Vec::new(),
            top_devices: Vec::new(),
            analysis_period_hours,
            cutoff_time,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_failed_calls == 0
    }

    /// The most frequent cause, if any failures were seen.
    pub fn top_cause(&self) -> Option<&CauseBucket> {
        self.by_cause.first()
    }
}
