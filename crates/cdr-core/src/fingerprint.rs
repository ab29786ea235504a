//! Content fingerprints for source files and natural keys for records.
//!
//! A file's identity for deduplication is its name plus a SHA-256 digest of
//! its bytes. The digest is computed in fixed-size chunks, so memory use does
//! not depend on file size.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use cdr_common::{DecodedRecord, Fingerprint, RecordKey};
use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 4096;

/// SHA-256 of everything `reader` yields, hex encoded.
pub fn file_fingerprint<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint of the file at `path`.
pub fn fingerprint_path(path: &Path) -> io::Result<Fingerprint> {
    file_fingerprint(File::open(path)?)
}

/// Natural key of a record: `(call_id, origination)`.
pub fn record_key(record: &DecodedRecord) -> RecordKey {
    record.key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digest() {
        let fp = file_fingerprint(&b"abc"[..]).unwrap();
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_input() {
        let fp = file_fingerprint(&b""[..]).unwrap();
        assert_eq!(
            fp.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_multi_chunk_matches_single_shot() {
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let streamed = file_fingerprint(&data[..]).unwrap();
        let direct = hex::encode(Sha256::digest(&data));
        assert_eq!(streamed.as_str(), direct);
    }

    #[test]
    fn test_fingerprint_path_changes_with_content() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"1,2,3\n").unwrap();
        let first = fingerprint_path(file.path()).unwrap();

        file.write_all(b"4,5,6\n").unwrap();
        let second = fingerprint_path(file.path()).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_record_key_ignores_non_key_fields() {
        use crate::decode::decode_line;
        use crate::fields::SchemaVersion;

        let leg = |origination: &str, dest_cause: &str| {
            let mut fields = vec![""; 60];
            fields[0] = "1";
            fields[1] = "2";
            fields[2] = "100200";
            fields[4] = origination;
            fields[33] = dest_cause;
            decode_line(&fields.join(","), SchemaVersion::V1).unwrap()
        };

        let busy = record_key(&leg("1700000000", "17"));
        let no_answer = record_key(&leg("1700000000", "19"));
        let later = record_key(&leg("1700000060", "17"));

        assert_eq!(busy, no_answer);
        assert_ne!(busy, later);
        assert_eq!(busy.call_id, "2-100200");
    }

    #[test]
    fn test_fingerprint_missing_file() {
        assert!(fingerprint_path(Path::new("/nonexistent/cdr_missing")).is_err());
    }
}
