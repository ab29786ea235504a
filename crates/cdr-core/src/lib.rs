//! CDR Failed-Call Triage Core Library
//!
//! This library provides the ingestion and reporting engine:
//! - Field schema and record decoding for CUCM CDR files
//! - Failure classification and content fingerprints
//! - File sources, the ingestion pipeline, and reports
//! - Retention sweeps over the store and report artifacts
//! - Configuration, logging, and exit codes for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod exit_codes;
pub mod fetch;
pub mod fields;
pub mod fingerprint;
pub mod generate;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod sweep;

pub use error::{Error, Result};
