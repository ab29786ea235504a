//! Configuration loading and validation for cdr-core.
//!
//! This module handles:
//! - Loading the JSON config file
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (positive windows, usable prefix)
//! - Sample config creation
//! - Config snapshots for report artifacts

pub mod validation;

pub use validation::{validate_config, ValidationError, MAX_WINDOW_HOURS};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::exit_codes::ExitCode;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "cdr_triage";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CDR_CONFIG";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file already exists: {path} (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },
}

impl ConfigError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ConfigError::IoError { .. } => ExitCode::IoError,
            _ => ExitCode::ConfigError,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory CDR files are delivered into.
    pub inbox_dir: PathBuf,
    /// Only files whose name starts with this prefix are ingested.
    pub file_prefix: String,
    pub database_path: PathBuf,
    pub report_output_dir: PathBuf,
    /// Analysis window for fetch and reporting.
    pub hours_to_analyze: u32,
    /// Horizon for purging stored calls and report artifacts.
    pub retention_days: u32,
    /// Label used in reports.
    pub cluster_name: String,
    /// Where artifact retention events are persisted (JSONL). Unset means
    /// events are only logged.
    pub retention_event_log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            inbox_dir: PathBuf::from("./cdr_files"),
            file_prefix: "cdr_".to_string(),
            database_path: PathBuf::from("./cdr_database.db"),
            report_output_dir: PathBuf::from("./reports"),
            hours_to_analyze: 24,
            retention_days: 7,
            cluster_name: "CUCM Cluster".to_string(),
            retention_event_log_dir: None,
        }
    }
}

/// Where the resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Flag,
    Env,
    Xdg,
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Flag => write!(f, "--config flag"),
            ConfigSource::Env => write!(f, "{CONFIG_ENV_VAR}"),
            ConfigSource::Xdg => write!(f, "XDG config home"),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 hash of the config file content (None if using defaults).
    pub hash: Option<String>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            path: self.path.clone(),
            hash: self.hash.clone(),
            source: self.source,
            hours_to_analyze: self.config.hours_to_analyze,
            retention_days: self.config.retention_days,
            cluster_name: self.config.cluster_name.clone(),
        }
    }
}

/// Config provenance embedded in report artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub source: ConfigSource,
    pub hours_to_analyze: u32,
    pub retention_days: u32,
    pub cluster_name: String,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flag (via ConfigOptions)
/// 2. Environment variable (CDR_CONFIG)
/// 3. XDG config home (~/.config/cdr_triage/config.json), if present
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    load_config_from(options, env_path, xdg_config_home())
}

fn load_config_from(
    options: &ConfigOptions,
    env_path: Option<PathBuf>,
    xdg_home: PathBuf,
) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = if let Some(path) = &options.config_path {
        (Some(path.clone()), ConfigSource::Flag)
    } else if let Some(path) = env_path {
        (Some(path), ConfigSource::Env)
    } else {
        let candidate = xdg_home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if candidate.exists() {
            (Some(candidate), ConfigSource::Xdg)
        } else {
            (None, ConfigSource::Defaults)
        }
    };

    let resolved = match path {
        Some(path) => {
            let (config, hash) = load_config_file(&path)?;
            ResolvedConfig {
                config,
                path: Some(path),
                hash: Some(hash),
                source,
            }
        }
        None => ResolvedConfig {
            config: Config::default(),
            path: None,
            hash: None,
            source,
        },
    };

    validate_config(&resolved.config)?;
    Ok(resolved)
}

/// Parse a config file without validating it. Returns the config and the
/// SHA-256 of its content.
pub fn load_config_file(path: &Path) -> Result<(Config, String), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = parse_config(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok((config, compute_hash(&content)))
}

/// Parse config JSON. Unknown keys are ignored; missing keys take defaults.
pub fn parse_config(content: &str) -> Result<Config, serde_json::Error> {
    serde_json::from_str(content)
}

/// Write a sample config file, refusing to overwrite unless `force` is set.
pub fn write_sample_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    let io_err = |e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let sample = Config {
        cluster_name: "Production CUCM Cluster".to_string(),
        ..Config::default()
    };
    let mut json = serde_json::to_string_pretty(&sample).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    json.push('\n');
    std::fs::write(path, json).map_err(io_err)
}

/// Default location of the config file (`$XDG_CONFIG_HOME/cdr_triage/config.json`).
pub fn default_config_path() -> PathBuf {
    xdg_config_home()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

fn xdg_config_home() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        })
}

fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_nothing_present() {
        let tmp = TempDir::new().unwrap();
        let resolved =
            load_config_from(&ConfigOptions::default(), None, tmp.path().to_path_buf()).unwrap();
        assert_eq!(resolved.source, ConfigSource::Defaults);
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.hash.is_none());
    }

    #[test]
    fn test_flag_beats_env_and_xdg() {
        let tmp = TempDir::new().unwrap();
        let flag = tmp.path().join("flag.json");
        let env = tmp.path().join("env.json");
        std::fs::write(&flag, r#"{"hours_to_analyze": 12}"#).unwrap();
        std::fs::write(&env, r#"{"hours_to_analyze": 48}"#).unwrap();

        let options = ConfigOptions {
            config_path: Some(flag.clone()),
        };
        let resolved =
            load_config_from(&options, Some(env.clone()), tmp.path().to_path_buf()).unwrap();
        assert_eq!(resolved.source, ConfigSource::Flag);
        assert_eq!(resolved.config.hours_to_analyze, 12);

        let resolved =
            load_config_from(&ConfigOptions::default(), Some(env), tmp.path().to_path_buf())
                .unwrap();
        assert_eq!(resolved.source, ConfigSource::Env);
        assert_eq!(resolved.config.hours_to_analyze, 48);
    }

    #[test]
    fn test_xdg_file_used_when_present() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), r#"{"retention_days": 30}"#).unwrap();

        let resolved =
            load_config_from(&ConfigOptions::default(), None, tmp.path().to_path_buf()).unwrap();
        assert_eq!(resolved.source, ConfigSource::Xdg);
        assert_eq!(resolved.config.retention_days, 30);
        assert_eq!(resolved.config.file_prefix, "cdr_");
        assert_eq!(resolved.hash.as_ref().map(|h| h.len()), Some(64));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: Some(tmp.path().join("missing.json")),
        };
        let err = load_config_from(&options, None, tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let options = ConfigOptions {
            config_path: Some(path),
        };
        let err = load_config_from(&options, None, tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_semantic_validation_applied() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zero.json");
        std::fs::write(&path, r#"{"hours_to_analyze": 0}"#).unwrap();
        let options = ConfigOptions {
            config_path: Some(path),
        };
        let err = load_config_from(&options, None, tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_sample_config_roundtrips_and_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sub").join("config.json");

        write_sample_config(&path, false).unwrap();
        let (config, _) = load_config_file(&path).unwrap();
        assert_eq!(config.cluster_name, "Production CUCM Cluster");
        assert!(validate_config(&config).is_ok());

        assert!(matches!(
            write_sample_config(&path, false),
            Err(ConfigError::AlreadyExists { .. })
        ));
        write_sample_config(&path, true).unwrap();
    }

    #[test]
    fn test_snapshot_serializes() {
        let tmp = TempDir::new().unwrap();
        let resolved =
            load_config_from(&ConfigOptions::default(), None, tmp.path().to_path_buf()).unwrap();
        let json = serde_json::to_string(&resolved.snapshot()).unwrap();
        assert!(json.contains(r#""source":"defaults""#));
    }
}
