//! End-to-end runs: fetch → ingest → report → sweep.

use std::path::PathBuf;

use cdr_store::{CallStore, SqliteStore};
use serde::{Deserialize, Serialize};

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::fetch::{CdrSource, InboxSource};
use crate::ingest::{ingest_files, RunSummary};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::report::FailedCallReport;
use crate::sweep::{RetentionSweeper, SweepSummary};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report from what the store already holds; no fetch, no ingest.
    pub skip_fetch: bool,
    /// Skip writing the JSON artifact.
    pub no_artifact: bool,
}

/// Everything one `run` produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<RunSummary>,
    pub report: FailedCallReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    pub sweep: SweepSummary,
}

/// Open the configured store.
pub fn open_store(resolved: &ResolvedConfig) -> Result<SqliteStore> {
    Ok(SqliteStore::open(&resolved.config.database_path)?)
}

/// Snapshot and failed calls over the last `window_hours`.
pub fn build_report<S>(
    store: &S,
    resolved: &ResolvedConfig,
    window_hours: u32,
    ctx: &LogContext,
) -> Result<FailedCallReport>
where
    S: CallStore + ?Sized,
{
    let (snapshot, failed_calls) = store.query_window(window_hours)?;

    log_event!(
        ctx,
        INFO,
        event_names::SNAPSHOT_COMPUTED,
        Stage::Aggregate,
        "Computed failure snapshot",
        window_hours = window_hours,
        total = snapshot.total_failed_calls,
        causes = snapshot.by_cause.len()
    );

    Ok(FailedCallReport::new(
        &ctx.run_id,
        &resolved.config.cluster_name,
        snapshot,
        failed_calls,
    )
    .with_config(resolved.snapshot()))
}

/// Full run against `store` with files from `source`.
pub fn run_with<S, Src>(
    store: &mut S,
    source: &Src,
    resolved: &ResolvedConfig,
    options: RunOptions,
    ctx: &LogContext,
) -> Result<RunOutcome>
where
    S: CallStore + ?Sized,
    Src: CdrSource + ?Sized,
{
    let config = &resolved.config;
    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "Starting triage run",
        cluster = %config.cluster_name,
        hours = config.hours_to_analyze,
        skip_fetch = options.skip_fetch
    );

    let ingest = if options.skip_fetch {
        log_event!(
            ctx,
            INFO,
            event_names::FETCH_SKIPPED,
            Stage::Fetch,
            "Fetch skipped; reporting from stored data"
        );
        None
    } else {
        let files = source.fetch(config.hours_to_analyze)?;
        log_event!(
            ctx,
            INFO,
            event_names::FETCH_LISTED,
            Stage::Fetch,
            "Listed CDR files",
            source = source.name(),
            files = files.len()
        );
        Some(ingest_files(store, &files, ctx)?)
    };

    let report = build_report(&*store, resolved, config.hours_to_analyze, ctx)?;
    let artifact = if options.no_artifact {
        None
    } else {
        let path = report.write_artifact(&config.report_output_dir)?;
        log_event!(
            ctx,
            INFO,
            event_names::REPORT_WRITTEN,
            Stage::Report,
            "Wrote report artifact",
            path = %path.display()
        );
        Some(path)
    };

    let sweep = RetentionSweeper::from_config(config).sweep(store, false, ctx)?;

    Ok(RunOutcome {
        ingest,
        report,
        artifact,
        sweep,
    })
}

/// Full run against the configured store and inbox.
pub fn run(resolved: &ResolvedConfig, options: RunOptions, ctx: &LogContext) -> Result<RunOutcome> {
    let mut store = open_store(resolved)?;
    let source = InboxSource::new(
        resolved.config.inbox_dir.clone(),
        resolved.config.file_prefix.clone(),
    );
    run_with(&mut store, &source, resolved, options, ctx)
}
