//! Semantic validation for the triage configuration.
//!
//! Serde checks shape and types; this module checks that values make sense
//! (positive windows, usable prefixes, distinct paths).

use thiserror::Error;

use super::Config;

/// Longest analysis window accepted, in hours (one year).
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Errors that can occur during semantic validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("hours_to_analyze must be in 1..={max} (got {value})")]
    WindowRange { value: u32, max: u32 },

    #[error("retention_days must be at least 1 (got {value})")]
    RetentionNonPositive { value: u32 },

    #[error("file_prefix must not be empty")]
    EmptyPrefix,

    #[error("file_prefix must not contain a path separator (got {value:?})")]
    PrefixHasSeparator { value: String },

    #[error("{field} must not be empty")]
    EmptyPath { field: &'static str },

    #[error("database_path must not be inside report_output_dir (retention would sweep it)")]
    DatabaseInReportDir,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if config.hours_to_analyze == 0 || config.hours_to_analyze > MAX_WINDOW_HOURS {
        return Err(ValidationError::WindowRange {
            value: config.hours_to_analyze,
            max: MAX_WINDOW_HOURS,
        });
    }

    if config.retention_days == 0 {
        return Err(ValidationError::RetentionNonPositive {
            value: config.retention_days,
        });
    }

    if config.file_prefix.is_empty() {
        return Err(ValidationError::EmptyPrefix);
    }
    if config.file_prefix.contains(|c: char| c == '/' || c == '\\') {
        return Err(ValidationError::PrefixHasSeparator {
            value: config.file_prefix.clone(),
        });
    }

    for (field, path) in [
        ("inbox_dir", &config.inbox_dir),
        ("database_path", &config.database_path),
        ("report_output_dir", &config.report_output_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath { field });
        }
    }

    if config.database_path.starts_with(&config.report_output_dir) {
        return Err(ValidationError::DatabaseInReportDir);
    }

    Ok(())
}
