//! Snapshot file format definitions
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic        [u8; 8]   "KVDUMP\0\0"
//! version      u32
//! created_at   i64       unix milliseconds
//! revision     i64       store revision the range was read at
//! prefix_len   u32
//! prefix       [u8; prefix_len]
//! record_count u64
//! record_count x { tag u8 (0x01), len u32, payload [u8; len] }
//! end_marker   [u8; 10]  "KVDUMP_END"
//! checksum     [u8; 32]  SHA-256 of every byte before end_marker
//! ```

use crate::record::{self, Record};
use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;

/// Magic bytes for snapshot files
pub const SNAPSHOT_MAGIC: &[u8; 8] = b"KVDUMP\0\0";

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// End marker for snapshot files
pub const SNAPSHOT_END_MARKER: &[u8; 10] = b"KVDUMP_END";

/// Entry tag for one encoded record
pub const TAG_RECORD: u8 = 0x01;

/// Size of the SHA-256 trailer
pub const CHECKSUM_LEN: usize = 32;

/// Bytes of framing around each record payload (tag + length)
pub const RECORD_FRAME_LEN: usize = 1 + 4;

/// Snapshot header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version
    pub version: u32,
    /// Creation timestamp, millisecond precision
    pub created_at: DateTime<Utc>,
    /// Store revision at dump time
    pub revision: i64,
    /// Prefix the range was selected with
    pub prefix: Vec<u8>,
}

impl SnapshotHeader {
    /// Create a header stamped with the current time
    pub fn new(prefix: impl Into<Vec<u8>>, revision: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: truncate_to_millis(Utc::now()),
            revision,
            prefix: prefix.into(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = truncate_to_millis(created_at);
        self
    }

    pub fn prefix_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.prefix)
    }
}

/// Drop sub-millisecond precision so a header survives encoding unchanged
fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    millis_to_datetime(at.timestamp_millis()).unwrap_or(at)
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Ordered capture of a range scan.
///
/// Entries are record payloads exactly as the record codec produced them;
/// this type never looks inside them except through [`Snapshot::records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    entries: Vec<Vec<u8>>,
}

impl Snapshot {
    pub fn new(header: SnapshotHeader) -> Self {
        Self {
            header,
            entries: Vec::new(),
        }
    }

    /// Build a snapshot from already-encoded payloads
    pub fn from_entries(header: SnapshotHeader, entries: Vec<Vec<u8>>) -> Self {
        Self { header, entries }
    }

    /// Encode `records` in order
    pub fn from_records<'a>(
        header: SnapshotHeader,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Self {
        let entries = records.into_iter().map(record::encode).collect();
        Self { header, entries }
    }

    /// Append one encoded record
    pub fn push(&mut self, payload: Vec<u8>) {
        self.entries.push(payload);
    }

    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of all record payloads
    pub fn payload_bytes(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }

    /// Decode every entry, failing on the first malformed one
    pub fn records(&self) -> Result<Vec<Record>, SnapshotError> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                record::decode(payload).map_err(|source| SnapshotError::InvalidRecord { index, source })
            })
            .collect()
    }
}

/// Snapshot-related errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot magic bytes")]
    InvalidMagic,

    #[error("unsupported snapshot version: {0}")]
    InvalidVersion(u32),

    #[error("invalid creation timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("snapshot truncated at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown entry tag {tag:#04x} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },

    #[error("{field} too large to encode: {len} bytes")]
    TooLarge { field: &'static str, len: usize },

    #[error("expected {expected} records, wrote {actual}")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("invalid end marker")]
    InvalidEndMarker,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("{0} unexpected bytes after checksum")]
    TrailingBytes(usize),

    #[error("record {index} is malformed: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: prost::DecodeError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_millisecond_precise() {
        let header = SnapshotHeader::new("a/", 7);
        assert_eq!(header.version, SNAPSHOT_VERSION);
        assert_eq!(header.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(header.prefix_str(), "a/");
    }

    #[test]
    fn test_records_decodes_in_order() {
        let records = vec![Record::new("a/1", "x"), Record::new("a/2", "y")];
        let snapshot = Snapshot::from_records(SnapshotHeader::new("a/", 2), &records);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records().unwrap(), records);
    }

    #[test]
    fn test_records_reports_bad_entry() {
        let mut snapshot = Snapshot::new(SnapshotHeader::new("a/", 1));
        snapshot.push(record::encode(&Record::new("a/1", "x")));
        snapshot.push(vec![0x0a, 0x7f]);

        match snapshot.records() {
            Err(SnapshotError::InvalidRecord { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_payload_bytes() {
        let snapshot = Snapshot::from_entries(SnapshotHeader::new("p", 0), vec![vec![1, 2], vec![3]]);
        assert_eq!(snapshot.payload_bytes(), 3);
        assert!(!snapshot.is_empty());
    }
}
