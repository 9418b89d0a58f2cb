//! Snapshot writer implementation

use super::{
    Snapshot, SnapshotError, SnapshotHeader, SNAPSHOT_END_MARKER, SNAPSHOT_MAGIC, TAG_RECORD,
};
use crate::error::{DumpError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Builds a snapshot blob in memory
pub struct SnapshotWriter {
    /// Encoded bytes so far
    buffer: Vec<u8>,
    /// Running checksum hasher
    hasher: Sha256,
    /// Record count announced in the header
    expected: u64,
    /// Records written so far
    written: u64,
}

impl SnapshotWriter {
    /// Start a snapshot that will hold exactly `record_count` records
    pub fn new(header: &SnapshotHeader, record_count: u64) -> std::result::Result<Self, SnapshotError> {
        let prefix_len = u32::try_from(header.prefix.len()).map_err(|_| SnapshotError::TooLarge {
            field: "prefix",
            len: header.prefix.len(),
        })?;

        let mut writer = Self {
            buffer: Vec::new(),
            hasher: Sha256::new(),
            expected: record_count,
            written: 0,
        };

        writer.write_bytes(SNAPSHOT_MAGIC);
        writer.write_bytes(&header.version.to_le_bytes());
        writer.write_bytes(&header.created_at.timestamp_millis().to_le_bytes());
        writer.write_bytes(&header.revision.to_le_bytes());
        writer.write_bytes(&prefix_len.to_le_bytes());
        writer.write_bytes(&header.prefix);
        writer.write_bytes(&record_count.to_le_bytes());

        Ok(writer)
    }

    /// Write one record payload
    pub fn write_record(&mut self, payload: &[u8]) -> std::result::Result<(), SnapshotError> {
        if self.written == self.expected {
            return Err(SnapshotError::CountMismatch {
                expected: self.expected,
                actual: self.written + 1,
            });
        }
        let len = u32::try_from(payload.len()).map_err(|_| SnapshotError::TooLarge {
            field: "record",
            len: payload.len(),
        })?;

        self.write_bytes(&[TAG_RECORD]);
        self.write_bytes(&len.to_le_bytes());
        self.write_bytes(payload);
        self.written += 1;

        Ok(())
    }

    /// Finalize the snapshot with footer
    pub fn finish(mut self) -> std::result::Result<Vec<u8>, SnapshotError> {
        if self.written != self.expected {
            return Err(SnapshotError::CountMismatch {
                expected: self.expected,
                actual: self.written,
            });
        }

        let checksum = self.hasher.finalize();

        // Footer is not covered by the checksum
        self.buffer.extend_from_slice(SNAPSHOT_END_MARKER);
        self.buffer.extend_from_slice(&checksum);

        Ok(self.buffer)
    }

    /// Write bytes and update checksum
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.hasher.update(bytes);
    }

    /// Get the number of bytes written
    pub fn bytes_written(&self) -> usize {
        self.buffer.len()
    }
}

/// Encode a whole snapshot into one blob
pub fn encode(snapshot: &Snapshot) -> std::result::Result<Vec<u8>, SnapshotError> {
    let mut writer = SnapshotWriter::new(&snapshot.header, snapshot.len() as u64)?;
    for payload in snapshot.entries() {
        writer.write_record(payload)?;
    }
    writer.finish()
}

/// Encode `snapshot` and write it to `path`, replacing any existing file.
///
/// Returns the number of bytes written.
pub async fn write_snapshot_file(path: &Path, snapshot: &Snapshot) -> Result<u64> {
    let blob = encode(snapshot)?;

    tokio::fs::write(path, &blob)
        .await
        .map_err(|source| DumpError::Output {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        "Wrote {} records ({} bytes) to {}",
        snapshot.len(),
        blob.len(),
        path.display()
    );
    Ok(blob.len() as u64)
}
