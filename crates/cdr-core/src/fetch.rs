//! CDR file sources.
//!
//! The engine never talks to a cluster directly. A [`CdrSource`] hands it a
//! list of local files to ingest; [`InboxSource`] reads a directory that an
//! external transfer job (SFTP push, billing-server export) drops files into.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::{Error, Result};

/// Source of CDR files for one run.
pub trait CdrSource {
    /// Source name used in logs.
    fn name(&self) -> &str;

    /// Paths of files delivered within the last `window_hours`, sorted by
    /// file name.
    fn fetch(&self, window_hours: u32) -> Result<Vec<PathBuf>>;
}

/// Local directory of delivered CDR files.
#[derive(Debug, Clone)]
pub struct InboxSource {
    dir: PathBuf,
    prefix: String,
}

impl InboxSource {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        InboxSource {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    fn matches_prefix(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.prefix))
    }
}

impl CdrSource for InboxSource {
    fn name(&self) -> &str {
        "inbox"
    }

    fn fetch(&self, window_hours: u32) -> Result<Vec<PathBuf>> {
        let inbox_err = |source| Error::Inbox {
            path: self.dir.clone(),
            source,
        };

        let horizon = SystemTime::now()
            .checked_sub(Duration::from_secs(u64::from(window_hours) * 3600))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(inbox_err)? {
            let entry = entry.map_err(inbox_err)?;
            let path = entry.path();
            if !self.matches_prefix(&path) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable inbox entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if modified < horizon {
                continue;
            }
            files.push(path);
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "1,2,3\n").unwrap();
        path
    }

    #[test]
    fn test_lists_prefixed_files_sorted() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "cdr_b");
        touch(tmp.path(), "cdr_a");
        touch(tmp.path(), "cmr_a");
        fs::create_dir(tmp.path().join("cdr_dir")).unwrap();

        let source = InboxSource::new(tmp.path(), "cdr_");
        let files = source.fetch(24).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cdr_a", "cdr_b"]);
    }

    #[test]
    fn test_excludes_files_outside_window() {
        let tmp = TempDir::new().unwrap();
        let old = touch(tmp.path(), "cdr_old");
        touch(tmp.path(), "cdr_new");
        let two_days_ago = SystemTime::now() - Duration::from_secs(48 * 3600);
        set_file_mtime(&old, FileTime::from_system_time(two_days_ago)).unwrap();

        let source = InboxSource::new(tmp.path(), "cdr_");
        let files = source.fetch(24).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("cdr_new"));

        assert_eq!(source.fetch(72).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_inbox_is_error() {
        let tmp = TempDir::new().unwrap();
        let source = InboxSource::new(tmp.path().join("absent"), "cdr_");
        let err = source.fetch(24).unwrap_err();
        assert!(matches!(err, Error::Inbox { .. }));
    }
}
