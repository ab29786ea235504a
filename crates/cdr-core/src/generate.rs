//! Synthetic CDR files for demos and end-to-end testing.
//!
//! One file per hour over the requested span, each holding roughly
//! `calls_per_hour` call legs. Failed legs have zero duration and a
//! terminating cause drawn from a weighted set of common failure causes.
//! Generation is deterministic for a given seed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Columns per generated row.
pub const GENERATED_COLUMNS: usize = 128;

const DEVICE_NAMES: &[&str] = &[
    "SEPB4A8B95D6F01",
    "SEPB4A8B95D6F02",
    "SEPB4A8B95D6F03",
    "SEPC4B2399F4A01",
    "SEPC4B2399F4A02",
    "SEPC4B2399F4A03",
    "CSFUSER001",
    "CSFUSER002",
    "CSFUSER003",
    "JABBERUSER01",
    "JABBERUSER02",
    "JABBERUSER03",
];

const CALLING_NUMBERS: &[&str] = &[
    "1001", "1002", "1003", "1004", "1005", "2001", "2002", "2003", "2004", "2005",
];

const CALLED_NUMBERS: &[&str] = &[
    "91555123456",
    "91555234567",
    "91555345678",
    "918001234567",
    "918009876543",
    "1100",
    "1200",
    "1300",
    "1400",
    "1500",
];

const IP_ADDRESSES: &[&str] = &[
    "10.1.1.100",
    "10.1.1.101",
    "10.1.1.102",
    "10.1.2.100",
    "10.1.2.101",
    "10.1.2.102",
];

/// Failure causes and their relative weights.
const FAILURE_CAUSES: &[(u32, u32)] = &[
    (1, 10),
    (3, 5),
    (17, 30),
    (18, 15),
    (19, 25),
    (21, 10),
    (27, 8),
    (28, 5),
    (31, 15),
    (34, 3),
];

const SUCCESS_CAUSES: &[u32] = &[0, 16];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorOptions {
    pub hours: u32,
    /// Average call legs per hourly file; each file varies by up to ±10.
    pub calls_per_hour: u32,
    /// Probability (0.0-1.0) that a leg is a failure.
    pub failure_rate: f64,
    /// Cluster label embedded in file names.
    pub cluster: String,
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            hours: 24,
            calls_per_hour: 50,
            failure_rate: 0.15,
            cluster: "TestCluster".to_string(),
            seed: None,
        }
    }
}

impl GeneratorOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(Error::InvalidArgument(format!(
                "failure rate must be within 0.0..=1.0 (got {})",
                self.failure_rate
            )));
        }
        if self.hours == 0 {
            return Err(Error::InvalidArgument(
                "hours must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateSummary {
    pub seed: u64,
    pub files: Vec<PathBuf>,
    pub total_calls: u64,
    pub failed_calls: u64,
}

impl GenerateSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 100.0;
        }
        (self.total_calls - self.failed_calls) as f64 / self.total_calls as f64 * 100.0
    }
}

pub struct CdrGenerator {
    rng: StdRng,
    seed: u64,
    options: GeneratorOptions,
}

impl CdrGenerator {
    pub fn new(options: GeneratorOptions) -> Result<Self> {
        options.validate()?;
        let seed = options.seed.unwrap_or_else(rand::random);
        Ok(CdrGenerator {
            rng: StdRng::seed_from_u64(seed),
            seed,
            options,
        })
    }

    /// Write one file per hour, oldest first, ending the hour before `now`.
    pub fn write_files(&mut self, dir: &Path, now: DateTime<Utc>) -> Result<GenerateSummary> {
        fs::create_dir_all(dir)?;
        let mut summary = GenerateSummary {
            seed: self.seed,
            ..Default::default()
        };
        let cluster = file_label(&self.options.cluster);

        for offset in (1..=self.options.hours).rev() {
            let file_start = now - Duration::hours(i64::from(offset));
            let name = format!(
                "cdr_{}_01_{}_1",
                cluster,
                file_start.format("%Y%m%d%H%M%S")
            );

            let jitter = self.rng.random_range(-10i64..=10);
            let calls = (i64::from(self.options.calls_per_hour) + jitter).max(0) as u64;

            let mut body = String::new();
            for _ in 0..calls {
                let at = file_start
                    + Duration::minutes(self.rng.random_range(0..60))
                    + Duration::seconds(self.rng.random_range(0..60));
                let failed = self.rng.random_bool(self.options.failure_rate);
                body.push_str(&self.row(at, failed).join(","));
                body.push('\n');

                summary.total_calls += 1;
                if failed {
                    summary.failed_calls += 1;
                }
            }

            let path = dir.join(&name);
            fs::write(&path, body)?;
            debug!(file = %name, calls, "Generated CDR file");
            summary.files.push(path);
        }

        Ok(summary)
    }

    /// One call-leg row.
    fn row(&mut self, origination: DateTime<Utc>, failed: bool) -> Vec<String> {
        let epoch = origination.timestamp();
        let (duration, orig_cause, dest_cause, connect, disconnect) = if failed {
            let dest_cause = self.failure_cause();
            let disconnect = epoch + self.rng.random_range(1..=30);
            (0, 0, dest_cause, None, disconnect)
        } else {
            let duration: i64 = self.rng.random_range(10..=600);
            let connect = epoch + self.rng.random_range(2..=10);
            (
                duration,
                self.pick_u32(SUCCESS_CAUSES),
                self.pick_u32(SUCCESS_CAUSES),
                Some(connect),
                connect + duration,
            )
        };

        let called = self.pick(CALLED_NUMBERS);
        let mut row = vec![String::new(); GENERATED_COLUMNS];
        row[0] = "1".to_string();
        row[1] = self.rng.random_range(1..=2u32).to_string();
        row[2] = self.rng.random_range(100_000..=999_999u32).to_string();
        row[3] = self.rng.random_range(1000..=9999u32).to_string();
        row[4] = epoch.to_string();
        row[5] = self.rng.random_range(1..=2u32).to_string();
        row[6] = "0".to_string();
        row[7] = self.pick(IP_ADDRESSES);
        row[8] = self.pick(CALLING_NUMBERS);
        row[11] = orig_cause.to_string();
        row[28] = self.pick(IP_ADDRESSES);
        row[29] = called.clone();
        row[30] = called;
        row[33] = dest_cause.to_string();
        row[47] = connect.map(|c| c.to_string()).unwrap_or_default();
        row[48] = disconnect.to_string();
        row[55] = duration.to_string();
        row[56] = self.pick(DEVICE_NAMES);
        row[57] = self.pick(DEVICE_NAMES);
        row
    }

    fn pick(&mut self, pool: &[&str]) -> String {
        pool.choose(&mut self.rng).copied().unwrap_or_default().to_string()
    }

    fn pick_u32(&mut self, pool: &[u32]) -> u32 {
        pool.choose(&mut self.rng).copied().unwrap_or(0)
    }

    fn failure_cause(&mut self) -> u32 {
        let total: u32 = FAILURE_CAUSES.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.random_range(0..total);
        for &(code, weight) in FAILURE_CAUSES {
            if roll < weight {
                return code;
            }
            roll -= weight;
        }
        FAILURE_CAUSES[0].0
    }
}

/// Cluster label reduced to characters safe in a file name.
fn file_label(cluster: &str) -> String {
    let label: String = cluster
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if label.is_empty() {
        "Cluster".to_string()
    } else {
        label
    }
}
