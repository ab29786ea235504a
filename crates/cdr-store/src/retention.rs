//! Retention enforcement for report artifacts.
//!
//! Report runs leave JSON (and optionally rendered) artifacts in the report
//! directory. They age out on the same horizon as the stored failed calls,
//! judged by file modification time. Every removal produces a
//! [`RetentionEvent`]; nothing is deleted silently.
//!
//! # Example
//!
//! ```no_run
//! use cdr_store::retention::{RetentionConfig, RetentionEnforcer};
//! use std::path::PathBuf;
//!
//! let enforcer = RetentionEnforcer::new(PathBuf::from("reports"), RetentionConfig::default());
//!
//! let plan = enforcer.plan()?;
//! println!("{} of {} artifacts expired", plan.expired.len(), plan.scanned);
//!
//! for event in enforcer.enforce()? {
//!     println!("Pruned: {} ({} days old)", event.file_path, event.age_days);
//! }
//! # Ok::<(), cdr_store::retention::RetentionError>(())
//! ```

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const SECS_PER_DAY: u64 = 86_400;

/// Errors from retention operations.
#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for artifact retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Artifacts older than this many days are pruned.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,

    /// File extensions (without the dot) considered report artifacts.
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,

    /// Where to append a JSONL record of each pruning pass. Never scanned.
    #[serde(default)]
    pub event_log_dir: Option<PathBuf>,
}

fn default_ttl_days() -> u32 {
    7
}

fn default_artifact_extensions() -> Vec<String> {
    ["json", "md", "html", "pdf"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            ttl_days: default_ttl_days(),
            artifact_extensions: default_artifact_extensions(),
            event_log_dir: None,
        }
    }
}

impl RetentionConfig {
    pub fn with_ttl_days(ttl_days: u32) -> Self {
        RetentionConfig {
            ttl_days,
            ..Default::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * SECS_PER_DAY)
    }

    pub fn validate(&self) -> Result<(), RetentionError> {
        if self.ttl_days == 0 {
            return Err(RetentionError::InvalidConfig(
                "ttl_days must be at least 1".to_string(),
            ));
        }
        if self.artifact_extensions.is_empty() {
            return Err(RetentionError::InvalidConfig(
                "artifact_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.artifact_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// One artifact removed, or on a dry run, one that would be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionEvent {
    pub timestamp: DateTime<Utc>,

    /// Path relative to the report directory.
    pub file_path: String,

    pub size_bytes: u64,
    pub age_days: u32,
    pub ttl_days: u32,
    pub dry_run: bool,
}

/// An artifact found under the report directory.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub relative_path: String,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

impl ArtifactFile {
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified)
            .unwrap_or_default()
    }

    pub fn age_days(&self) -> u32 {
        u32::try_from(self.age().as_secs() / SECS_PER_DAY).unwrap_or(u32::MAX)
    }
}

/// What a pass would prune.
#[derive(Debug, Clone, Default)]
pub struct RetentionPlan {
    /// Artifacts found, expired or not.
    pub scanned: usize,
    /// Expired artifacts, oldest first.
    pub expired: Vec<ArtifactFile>,
}

impl RetentionPlan {
    pub fn bytes_to_free(&self) -> u64 {
        self.expired.iter().map(|a| a.size_bytes).sum()
    }
}

/// Enforces the TTL on report artifacts under one directory.
pub struct RetentionEnforcer {
    root_dir: PathBuf,
    config: RetentionConfig,
}

impl RetentionEnforcer {
    pub fn new(root_dir: PathBuf, config: RetentionConfig) -> Self {
        Self { root_dir, config }
    }

    /// Scan the report directory. A missing directory is an empty plan.
    pub fn plan(&self) -> Result<RetentionPlan, RetentionError> {
        let mut found = Vec::new();
        if self.root_dir.is_dir() {
            self.scan_dir(&self.root_dir, &mut found)?;
        }

        let ttl = self.config.ttl();
        let scanned = found.len();
        let mut expired: Vec<ArtifactFile> = found.into_iter().filter(|a| a.age() > ttl).collect();
        expired.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });

        Ok(RetentionPlan { scanned, expired })
    }

    /// Delete expired artifacts.
    pub fn enforce(&self) -> Result<Vec<RetentionEvent>, RetentionError> {
        let plan = self.plan()?;
        self.apply(&plan, false)
    }

    /// Report expired artifacts without deleting them.
    pub fn dry_run(&self) -> Result<Vec<RetentionEvent>, RetentionError> {
        let plan = self.plan()?;
        self.apply(&plan, true)
    }

    fn apply(&self, plan: &RetentionPlan, dry_run: bool) -> Result<Vec<RetentionEvent>, RetentionError> {
        let now = Utc::now();
        let mut events = Vec::with_capacity(plan.expired.len());

        for artifact in &plan.expired {
            let event = RetentionEvent {
                timestamp: now,
                file_path: artifact.relative_path.clone(),
                size_bytes: artifact.size_bytes,
                age_days: artifact.age_days(),
                ttl_days: self.config.ttl_days,
                dry_run,
            };

            if dry_run {
                info!(
                    file = %event.file_path,
                    size_bytes = event.size_bytes,
                    age_days = event.age_days,
                    "[DRY-RUN] Would prune report artifact"
                );
            } else {
                let full_path = self.root_dir.join(&artifact.relative_path);
                match fs::remove_file(&full_path) {
                    Ok(()) => debug!(path = %full_path.display(), "Pruned report artifact"),
                    // Already gone counts as pruned.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %full_path.display(), error = %e, "Failed to prune report artifact");
                        continue;
                    }
                }
            }

            events.push(event);
        }

        if let Some(log_dir) = &self.config.event_log_dir {
            append_events(&events, log_dir)?;
        }

        Ok(events)
    }

    fn scan_dir(&self, dir: &Path, found: &mut Vec<ArtifactFile>) -> Result<(), RetentionError> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                if self.config.event_log_dir.as_deref() != Some(path.as_path()) {
                    self.scan_dir(&path, found)?;
                }
            } else if self.config.is_artifact(&path) {
                let metadata = fs::metadata(&path)?;
                let relative_path = path
                    .strip_prefix(&self.root_dir)
                    .unwrap_or(path.as_path())
                    .display()
                    .to_string();

                found.push(ArtifactFile {
                    relative_path,
                    size_bytes: metadata.len(),
                    modified: metadata.modified()?,
                });
            }
        }
        Ok(())
    }
}

/// Write one JSONL file per pruning pass.
fn append_events(events: &[RetentionEvent], log_dir: &Path) -> Result<(), RetentionError> {
    if events.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(format!(
        "retention_events_{}.jsonl",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    let mut writer = BufWriter::new(fs::File::create(&log_path)?);
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(events = events.len(), path = %log_path.display(), "Wrote retention events");
    Ok(())
}
