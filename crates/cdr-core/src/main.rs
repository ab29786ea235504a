//! CDR Failed-Call Triage - command line entry point
//!
//! Handles:
//! - Scheduled runs (fetch → ingest → report → sweep)
//! - Manual ingestion of specific files
//! - Reports and failed-call listings over a window
//! - Retention purges and synthetic test data
//! - Configuration management

use std::path::PathBuf;

use cdr_common::{FailedCallEntry, OutputFormat, SCHEMA_VERSION};
use cdr_core::config::{
    default_config_path, load_config, load_config_file, validate_config, write_sample_config,
    ConfigError, ConfigOptions, ResolvedConfig, MAX_WINDOW_HOURS,
};
use cdr_core::error::{Error, Result};
use cdr_core::exit_codes::ExitCode;
use cdr_core::generate::{CdrGenerator, GeneratorOptions};
use cdr_core::ingest::ingest_files;
use cdr_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use cdr_core::pipeline::{build_report, open_store, run, RunOptions};
use cdr_core::report::FailedCallReport;
use cdr_core::sweep::RetentionSweeper;
use cdr_core::log_event;
use cdr_store::CallStore;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

/// CDR Failed-Call Triage - find and explain failed calls in CUCM CDR files
#[derive(Parser)]
#[command(name = "cdr-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (overrides CDR_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scheduled run: fetch → ingest → report → sweep
    Run(RunArgs),

    /// Ingest specific CDR files
    Ingest(IngestArgs),

    /// Failure statistics over a window
    Report(ReportArgs),

    /// List failed calls over a window, newest first
    Calls(CallsArgs),

    /// Delete failed calls and report artifacts past retention
    Purge(PurgeArgs),

    /// Write synthetic CDR files for testing
    Generate(GenerateArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct RunArgs {
    /// Report from stored data without fetching or ingesting
    #[arg(long)]
    skip_fetch: bool,

    /// Do not write the JSON report artifact
    #[arg(long)]
    no_artifact: bool,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// CDR files to ingest
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Analysis window in hours (defaults to hours_to_analyze)
    #[arg(long)]
    hours: Option<u32>,

    /// Do not write the JSON report artifact
    #[arg(long)]
    no_artifact: bool,
}

#[derive(Args, Debug)]
struct CallsArgs {
    /// Window in hours (defaults to hours_to_analyze)
    #[arg(long)]
    hours: Option<u32>,

    /// Maximum rows to print
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct PurgeArgs {
    /// Retention horizon in days (defaults to retention_days)
    #[arg(long)]
    days: Option<u32>,

    /// Show what would be deleted without deleting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Output directory (defaults to inbox_dir)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Hours of data to generate
    #[arg(long, short = 'H', default_value_t = 24)]
    hours: u32,

    /// Average calls per hour
    #[arg(long, short = 'c', default_value_t = 50)]
    calls: u32,

    /// Failure rate (0.0 - 1.0)
    #[arg(long, default_value_t = 0.15)]
    failure_rate: f64,

    /// Cluster label used in file names
    #[arg(long, default_value = "TestCluster")]
    cluster: String,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a sample config file
    Init {
        /// Destination (defaults to the XDG config location)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the resolved configuration and where it came from
    Show,
    /// Validate a config file
    Validate {
        /// File to validate (defaults to the resolved config)
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    // Machine-readable stdout gets machine-readable stderr unless overridden.
    let cli_format = std::env::var_os("CDR_LOG_FORMAT").is_none().then(|| {
        if cli.global.format.is_machine() {
            LogFormat::Jsonl
        } else {
            LogFormat::Human
        }
    });
    init_logging(&LogConfig::from_env(cli_level, cli_format));

    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let exit_code = match &cli.command {
        Commands::Run(args) => run_run(&cli.global, args, &ctx),
        Commands::Ingest(args) => run_ingest(&cli.global, args, &ctx),
        Commands::Report(args) => run_report(&cli.global, args, &ctx),
        Commands::Calls(args) => run_calls(&cli.global, args, &ctx),
        Commands::Purge(args) => run_purge(&cli.global, args, &ctx),
        Commands::Generate(args) => run_generate(&cli.global, args, &ctx),
        Commands::Config(args) => run_config(&cli.global, args, &ctx),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_run(global: &GlobalOpts, args: &RunArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let options = RunOptions {
            skip_fetch: args.skip_fetch,
            no_artifact: args.no_artifact,
        };
        let outcome = run(&resolved, options, ctx)?;

        match global.format {
            OutputFormat::Json => print_json(&envelope(ctx, &outcome))?,
            OutputFormat::Md => {
                if let Some(ingest) = &outcome.ingest {
                    println!("# Ingestion");
                    println!();
                    println!("- Files seen: {}", ingest.files_seen);
                    println!("- Files processed: {}", ingest.files_processed);
                    println!("- Already processed: {}", ingest.files_skipped_duplicate);
                    println!("- Unreadable: {}", ingest.files_unreadable);
                    println!("- Records processed: {}", ingest.records_processed);
                    println!("- New failed calls: {}", ingest.new_failed_calls);
                    println!();
                }
                print!("{}", outcome.report.render_markdown());
                if let Some(path) = &outcome.artifact {
                    println!();
                    println!("Artifact: {}", path.display());
                }
            }
            OutputFormat::Summary => {
                let ingest = outcome
                    .ingest
                    .as_ref()
                    .map(|s| {
                        format!(
                            "; ingested {} files, {} records, {} new failed",
                            s.files_processed, s.records_processed, s.new_failed_calls
                        )
                    })
                    .unwrap_or_default();
                println!(
                    "{}{}; purged {}",
                    outcome.report.render_summary(),
                    ingest,
                    outcome.sweep.purged_calls
                );
            }
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_ingest(global: &GlobalOpts, args: &IngestArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let mut store = open_store(&resolved)?;
        let summary = ingest_files(&mut store, &args.paths, ctx)?;

        match global.format {
            OutputFormat::Json => print_json(&envelope(ctx, &summary))?,
            OutputFormat::Md => {
                println!("# Ingestion");
                println!();
                println!("| Metric | Value |");
                println!("|--------|------:|");
                println!("| Files seen | {} |", summary.files_seen);
                println!("| Files processed | {} |", summary.files_processed);
                println!("| Already processed | {} |", summary.files_skipped_duplicate);
                println!("| Unreadable | {} |", summary.files_unreadable);
                println!("| Records processed | {} |", summary.records_processed);
                println!("| New failed calls | {} |", summary.new_failed_calls);
                println!("| Lines skipped | {} |", summary.lines_skipped);
            }
            OutputFormat::Summary => println!(
                "[{}] ingest: {} files ({} new, {} duplicate, {} unreadable), {} records, {} new failed calls",
                ctx.run_id,
                summary.files_seen,
                summary.files_processed,
                summary.files_skipped_duplicate,
                summary.files_unreadable,
                summary.records_processed,
                summary.new_failed_calls
            ),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_report(global: &GlobalOpts, args: &ReportArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let hours = window_hours(args.hours, &resolved)?;
        let store = open_store(&resolved)?;
        let report = build_report(&store, &resolved, hours, ctx)?;

        if !args.no_artifact {
            let path = report.write_artifact(&resolved.config.report_output_dir)?;
            log_event!(
                ctx,
                INFO,
                event_names::REPORT_WRITTEN,
                Stage::Report,
                "Wrote report artifact",
                path = %path.display()
            );
        }

        print_report(global, &report)
    })
}

fn run_calls(global: &GlobalOpts, args: &CallsArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let hours = window_hours(args.hours, &resolved)?;
        let store = open_store(&resolved)?;
        let mut calls = store.query_failed_calls(hours)?;
        let total = calls.len();
        if let Some(limit) = args.limit {
            calls.truncate(limit);
        }

        match global.format {
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct CallsPayload<'a> {
                    window_hours: u32,
                    total: usize,
                    failed_calls: &'a [FailedCallEntry],
                }
                print_json(&envelope(
                    ctx,
                    &CallsPayload {
                        window_hours: hours,
                        total,
                        failed_calls: &calls,
                    },
                ))?
            }
            OutputFormat::Md => {
                println!("# Failed Calls (last {} hours)", hours);
                println!();
                println!("| Time (UTC) | From | To | Cause | Reason | Device |");
                println!("|------------|------|----|------:|--------|--------|");
                for call in &calls {
                    println!(
                        "| {} | {} | {} | {} | {} | {} |",
                        call.origination.format("%Y-%m-%d %H:%M:%S"),
                        call.calling_number,
                        call.original_called_number,
                        call.primary_cause,
                        call.failure_reason,
                        call.orig_device
                    );
                }
                if calls.len() < total {
                    println!();
                    println!("Showing {} of {}.", calls.len(), total);
                }
            }
            OutputFormat::Summary => println!(
                "[{}] {} failed calls in last {}h",
                ctx.run_id, total, hours
            ),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_purge(global: &GlobalOpts, args: &PurgeArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let mut sweeper = RetentionSweeper::from_config(&resolved.config);
        if let Some(days) = args.days {
            if days == 0 {
                return Err(Error::InvalidArgument(
                    "--days must be at least 1".to_string(),
                ));
            }
            sweeper = sweeper.with_retention_days(days);
        }
        let mut store = open_store(&resolved)?;
        let summary = sweeper.sweep(&mut store, args.dry_run, ctx)?;

        match global.format {
            OutputFormat::Json => print_json(&envelope(ctx, &summary))?,
            OutputFormat::Md => {
                let prefix = if summary.dry_run { "[DRY-RUN] " } else { "" };
                println!("# {}Retention Sweep", prefix);
                println!();
                println!("Retention: {} days", summary.retention_days);
                println!("Failed calls purged: {}", summary.purged_calls);
                println!("Report artifacts: {}", summary.artifacts.len());
                for event in &summary.artifacts {
                    println!(
                        "- {} ({} bytes, {} days old)",
                        event.file_path, event.size_bytes, event.age_days
                    );
                }
            }
            OutputFormat::Summary => println!(
                "[{}] purge{}: {} failed calls, {} artifacts (retention {}d)",
                ctx.run_id,
                if summary.dry_run { " (dry-run)" } else { "" },
                summary.purged_calls,
                summary.artifacts.len(),
                summary.retention_days
            ),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_generate(global: &GlobalOpts, args: &GenerateArgs, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let output = match &args.output {
            Some(dir) => dir.clone(),
            None => resolve_config(global, ctx)?.config.inbox_dir,
        };
        let mut generator = CdrGenerator::new(GeneratorOptions {
            hours: args.hours,
            calls_per_hour: args.calls,
            failure_rate: args.failure_rate,
            cluster: args.cluster.clone(),
            seed: args.seed,
        })?;
        let summary = generator.write_files(&output, chrono::Utc::now())?;

        match global.format {
            OutputFormat::Json => print_json(&envelope(ctx, &summary))?,
            OutputFormat::Md => {
                println!("# Synthetic CDR Data");
                println!();
                println!("Output directory: {}", output.display());
                println!("Seed: {}", summary.seed);
                println!();
                for path in &summary.files {
                    println!("- {}", path.display());
                }
                println!();
                println!("Total calls: {}", summary.total_calls);
                println!("Failed calls: {}", summary.failed_calls);
                println!("Success rate: {:.1}%", summary.success_rate());
            }
            OutputFormat::Summary => println!(
                "[{}] generated {} files, {} calls, {} failed (seed {})",
                ctx.run_id,
                summary.files.len(),
                summary.total_calls,
                summary.failed_calls,
                summary.seed
            ),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs, ctx: &LogContext) -> ExitCode {
    match &args.command {
        ConfigCommands::Init { path, force } => run_config_init(global, path.as_ref(), *force, ctx),
        ConfigCommands::Show => run_config_show(global, ctx),
        ConfigCommands::Validate { path } => run_config_validate(global, path.as_ref(), ctx),
    }
}

fn run_config_init(
    global: &GlobalOpts,
    path: Option<&PathBuf>,
    force: bool,
    ctx: &LogContext,
) -> ExitCode {
    finish(global, ctx, || {
        let path = path.cloned().unwrap_or_else(default_config_path);
        write_sample_config(&path, force)?;

        match global.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "created",
                "path": path.display().to_string(),
            }))?,
            OutputFormat::Md => println!("Wrote sample config to {}", path.display()),
            OutputFormat::Summary => {
                println!("[{}] config init: {}", ctx.run_id, path.display())
            }
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_config_show(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let resolved = resolve_config(global, ctx)?;
        let snapshot = resolved.snapshot();

        match global.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": snapshot.source,
                "path": snapshot.path.as_ref().map(|p| p.display().to_string()),
                "hash": snapshot.hash,
                "config": resolved.config,
            }))?,
            OutputFormat::Md => {
                let config = &resolved.config;
                println!("# cdr-core config show");
                println!();
                match &snapshot.path {
                    Some(path) => {
                        println!("Source: {} ({})", path.display(), snapshot.source);
                        println!("Hash: {}", snapshot.hash.as_deref().unwrap_or("n/a"));
                    }
                    None => println!("Source: **built-in defaults** (no config file found)"),
                }
                println!();
                println!("| Key | Value |");
                println!("|-----|-------|");
                println!("| inbox_dir | {} |", config.inbox_dir.display());
                println!("| file_prefix | {} |", config.file_prefix);
                println!("| database_path | {} |", config.database_path.display());
                println!("| report_output_dir | {} |", config.report_output_dir.display());
                println!("| hours_to_analyze | {} |", config.hours_to_analyze);
                println!("| retention_days | {} |", config.retention_days);
                println!("| cluster_name | {} |", config.cluster_name);
            }
            OutputFormat::Summary => println!(
                "[{}] config: source={} hours={} retention={}d",
                ctx.run_id, snapshot.source, snapshot.hours_to_analyze, snapshot.retention_days
            ),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn run_config_validate(global: &GlobalOpts, path: Option<&PathBuf>, ctx: &LogContext) -> ExitCode {
    finish(global, ctx, || {
        let checked = match path {
            Some(path) => {
                let (config, _hash) = load_config_file(path)?;
                validate_config(&config).map_err(ConfigError::from)?;
                Some(path.clone())
            }
            None => resolve_config(global, ctx)?.path,
        };

        match global.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "valid",
                "path": checked.as_ref().map(|p| p.display().to_string()),
                "using_defaults": checked.is_none(),
            }))?,
            OutputFormat::Md => {
                println!("# Configuration Validation");
                println!();
                println!("Status: valid");
                match &checked {
                    Some(path) => println!("Config: {}", path.display()),
                    None => println!("Config: using built-in defaults"),
                }
            }
            OutputFormat::Summary => println!("[{}] config validate: OK", ctx.run_id),
            OutputFormat::Exitcode => {}
        }
        Ok(())
    })
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "name": "cdr-core",
                "version": version,
                "schema_version": SCHEMA_VERSION,
            });
            println!("{}", payload);
        }
        OutputFormat::Exitcode => {}
        _ => println!("cdr-core {}", version),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    let resolved = load_config(&options)?;
    log_event!(
        ctx,
        DEBUG,
        event_names::CONFIG_LOADED,
        Stage::Init,
        "Loaded configuration",
        source = %resolved.source,
        path = ?resolved.path
    );
    Ok(resolved)
}

fn window_hours(requested: Option<u32>, resolved: &ResolvedConfig) -> Result<u32> {
    let hours = requested.unwrap_or(resolved.config.hours_to_analyze);
    if hours == 0 || hours > MAX_WINDOW_HOURS {
        return Err(Error::InvalidArgument(format!(
            "--hours must be in 1..={} (got {})",
            MAX_WINDOW_HOURS, hours
        )));
    }
    Ok(hours)
}

fn print_report(global: &GlobalOpts, report: &FailedCallReport) -> Result<()> {
    match global.format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Md => print!("{}", report.render_markdown()),
        OutputFormat::Summary => println!("{}", report.render_summary()),
        OutputFormat::Exitcode => {}
    }
    Ok(())
}

/// Wrap a payload with the standard response header.
fn envelope<T: Serialize>(ctx: &LogContext, payload: &T) -> serde_json::Value {
    let mut value = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
    });
    if let (Some(header), Ok(serde_json::Value::Object(body))) =
        (value.as_object_mut(), serde_json::to_value(payload))
    {
        header.extend(body);
    }
    value
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a command body and map its error to output plus an exit code.
fn finish(global: &GlobalOpts, ctx: &LogContext, body: impl FnOnce() -> Result<()>) -> ExitCode {
    match body() {
        Ok(()) => ExitCode::Clean,
        Err(e) => output_error(global, ctx, &e),
    }
}

fn output_error(global: &GlobalOpts, ctx: &LogContext, error: &Error) -> ExitCode {
    let exit_code = error.exit_code();
    let event = match error {
        Error::Config(_) => event_names::CONFIG_ERROR,
        Error::Store(_) => event_names::STORE_ERROR,
        _ => event_names::RUN_FINISHED,
    };
    log_event!(
        ctx,
        ERROR,
        event,
        Stage::Init,
        "Command failed",
        error = %error,
        exit_code = exit_code.as_i32()
    );

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": error.to_json(),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
            );
        }
        OutputFormat::Summary => eprintln!("[{}] error: {}", ctx.run_id, error),
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            eprintln!("# Error");
            eprintln!();
            eprintln!("{}", error);
        }
    }

    exit_code
}
