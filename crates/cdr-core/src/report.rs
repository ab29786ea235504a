//! Failed-call reports.
//!
//! A [`FailedCallReport`] is plain serde data: the windowed snapshot plus the
//! failed calls behind it. It renders to JSON (stdout or a timestamped
//! artifact in the report directory), markdown, or a one-line summary.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use cdr_common::{AggregateSnapshot, FailedCallEntry, RankEntry, SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConfigSnapshot;
use crate::error::{Error, Result};

/// Prefix of every report artifact file name.
pub const ARTIFACT_PREFIX: &str = "cdr_failed_calls_";

/// Rows shown in the markdown detail table.
const DETAIL_ROWS: usize = 50;

/// Cause rows shown in the markdown cause table.
const CAUSE_ROWS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCallReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub cluster_name: String,
    /// Provenance of the configuration the run used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
    pub snapshot: AggregateSnapshot,
    /// Newest first.
    pub failed_calls: Vec<FailedCallEntry>,
}

impl FailedCallReport {
    pub fn new(
        run_id: impl Into<String>,
        cluster_name: impl Into<String>,
        snapshot: AggregateSnapshot,
        failed_calls: Vec<FailedCallEntry>,
    ) -> Self {
        FailedCallReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id: run_id.into(),
            cluster_name: cluster_name.into(),
            config: None,
            snapshot,
            failed_calls,
        }
    }

    pub fn with_config(mut self, config: ConfigSnapshot) -> Self {
        self.config = Some(config);
        self
    }

    /// File name of this report's artifact.
    pub fn artifact_name(&self) -> String {
        format!(
            "{}{}.json",
            ARTIFACT_PREFIX,
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the JSON artifact into `dir`, creating it if needed.
    pub fn write_artifact(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.artifact_name());
        let write_err = |source| Error::ReportWrite {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(write_err)?;
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(&path, body).map_err(write_err)?;
        Ok(path)
    }

    pub fn render_markdown(&self) -> String {
        let snap = &self.snapshot;
        let mut out = String::new();

        let _ = writeln!(out, "# Failed Calls Report");
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.cluster_name);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "Analysis period: last {} hours (since {})",
            snap.analysis_period_hours,
            snap.cutoff_time.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out);
        let _ = writeln!(out, "Total failed calls: **{}**", snap.total_failed_calls);

        if snap.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "No failed calls in this window.");
            return out;
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Failures by Cause Code");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Cause | Reason | Count | Percentage |");
        let _ = writeln!(out, "|------:|--------|------:|-----------:|");
        for bucket in snap.by_cause.iter().take(CAUSE_ROWS) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.1}% |",
                bucket.code,
                truncate(&bucket.reason, 40),
                bucket.count,
                bucket.percentage
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Failures by Hour (UTC)");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Hour | Count |");
        let _ = writeln!(out, "|------|------:|");
        for bucket in &snap.by_hour {
            let _ = writeln!(out, "| {} | {} |", bucket.label(), bucket.count);
        }

        rank_table(&mut out, "Top Devices with Failures", "Device", &snap.top_devices);
        rank_table(&mut out, "Top Calling Numbers", "Number", &snap.top_callers);
        rank_table(&mut out, "Top Called Numbers", "Number", &snap.top_destinations);

        let shown = self.failed_calls.len().min(DETAIL_ROWS);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Recent Failed Calls");
        let _ = writeln!(out);
        let _ = writeln!(out, "Showing most recent {} failed calls.", shown);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Time | From | To | Cause | Device |");
        let _ = writeln!(out, "|------|------|----|------:|--------|");
        for call in self.failed_calls.iter().take(DETAIL_ROWS) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                call.origination.format("%m/%d %H:%M"),
                truncate(or_unknown(&call.calling_number), 15),
                truncate(or_unknown(&call.original_called_number), 15),
                call.primary_cause,
                truncate(or_unknown(&call.orig_device), 20)
            );
        }

        out
    }

    /// One line for cron mail and terminals.
    pub fn render_summary(&self) -> String {
        let snap = &self.snapshot;
        match snap.top_cause() {
            Some(top) => format!(
                "[{}] {}: {} failed calls in last {}h; top cause {} ({}) {:.1}%",
                self.run_id,
                self.cluster_name,
                snap.total_failed_calls,
                snap.analysis_period_hours,
                top.code,
                top.reason,
                top.percentage
            ),
            None => format!(
                "[{}] {}: no failed calls in last {}h",
                self.run_id, self.cluster_name, snap.analysis_period_hours
            ),
        }
    }
}

fn rank_table(out: &mut String, title: &str, column: &str, rows: &[RankEntry]) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## {}", title);
    let _ = writeln!(out);
    let _ = writeln!(out, "| {} | Failed Calls |", column);
    let _ = writeln!(out, "|--------|-------------:|");
    for row in rows {
        let _ = writeln!(out, "| {} | {} |", row.key, row.count);
    }
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() {
        "Unknown"
    } else {
        s
    }
}

/// Shorten to `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max).collect();
    format!("{}...", kept)
}
