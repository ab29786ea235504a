//! Retention sweep: purge aged failed calls and aged report artifacts.
//!
//! Both use the same horizon, `retention_days`. The store purge is strict
//! (`origination < now - retention_days`); artifacts are aged by mtime.

use std::path::PathBuf;

use cdr_store::retention::{RetentionConfig, RetentionEnforcer, RetentionEvent};
use cdr_store::CallStore;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub retention_days: u32,
    pub dry_run: bool,
    /// Failed calls deleted (always 0 on a dry run).
    pub purged_calls: usize,
    /// One event per artifact removed or, on a dry run, that would be.
    pub artifacts: Vec<RetentionEvent>,
}

impl SweepSummary {
    pub fn artifacts_removed(&self) -> usize {
        if self.dry_run {
            0
        } else {
            self.artifacts.len()
        }
    }
}

/// Applies the retention horizon to the store and the report directory.
pub struct RetentionSweeper {
    retention_days: u32,
    report_dir: PathBuf,
    event_log_dir: Option<PathBuf>,
}

impl RetentionSweeper {
    pub fn new(retention_days: u32, report_dir: impl Into<PathBuf>) -> Self {
        RetentionSweeper {
            retention_days,
            report_dir: report_dir.into(),
            event_log_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        RetentionSweeper {
            retention_days: config.retention_days,
            report_dir: config.report_output_dir.clone(),
            event_log_dir: config.retention_event_log_dir.clone(),
        }
    }

    pub fn with_retention_days(mut self, retention_days: u32) -> Self {
        self.retention_days = retention_days;
        self
    }

    fn enforcer(&self) -> Result<RetentionEnforcer> {
        let config = RetentionConfig {
            event_log_dir: self.event_log_dir.clone(),
            ..RetentionConfig::with_ttl_days(self.retention_days)
        };
        config.validate()?;
        Ok(RetentionEnforcer::new(self.report_dir.clone(), config))
    }

    /// Run the sweep. A dry run deletes nothing from either side.
    pub fn sweep<S>(&self, store: &mut S, dry_run: bool, ctx: &LogContext) -> Result<SweepSummary>
    where
        S: CallStore + ?Sized,
    {
        let enforcer = self.enforcer()?;

        let purged_calls = if dry_run {
            0
        } else {
            store.purge_older_than(self.retention_days)?
        };
        log_event!(
            ctx,
            INFO,
            event_names::SWEEP_PURGED,
            Stage::Sweep,
            "Store retention applied",
            retention_days = self.retention_days,
            purged = purged_calls,
            dry_run = dry_run
        );

        let artifacts = if dry_run {
            enforcer.dry_run()?
        } else {
            enforcer.enforce()?
        };
        log_event!(
            ctx,
            INFO,
            event_names::SWEEP_ARTIFACTS,
            Stage::Sweep,
            "Artifact retention applied",
            report_dir = %self.report_dir.display(),
            artifacts = artifacts.len(),
            dry_run = dry_run
        );

        Ok(SweepSummary {
            retention_days: self.retention_days,
            dry_run,
            purged_calls,
            artifacts,
        })
    }
}
