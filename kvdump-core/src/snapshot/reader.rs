//! Snapshot reader implementation

use super::format::millis_to_datetime;
use super::{
    Snapshot, SnapshotError, SnapshotHeader, CHECKSUM_LEN, RECORD_FRAME_LEN, SNAPSHOT_END_MARKER,
    SNAPSHOT_MAGIC, SNAPSHOT_VERSION, TAG_RECORD,
};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

type Result<T> = std::result::Result<T, SnapshotError>;

/// Cursor over a snapshot blob
pub struct SnapshotReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    /// Running checksum hasher
    hasher: Sha256,
    /// Records left to read, known once the header is read
    remaining: u64,
}

impl<'a> SnapshotReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            hasher: Sha256::new(),
            remaining: 0,
        }
    }

    /// Read and verify the snapshot header.
    ///
    /// Returns the header and the number of records that follow.
    pub fn read_header(&mut self) -> Result<(SnapshotHeader, u64)> {
        if self.read_bytes(SNAPSHOT_MAGIC.len())? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }

        let version = self.read_u32()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::InvalidVersion(version));
        }

        let created_millis = self.read_i64()?;
        let created_at =
            millis_to_datetime(created_millis).ok_or(SnapshotError::InvalidTimestamp(created_millis))?;
        let revision = self.read_i64()?;

        let prefix_len = self.read_u32()? as usize;
        let prefix = self.read_bytes(prefix_len)?.to_vec();

        let record_count = self.read_u64()?;
        self.remaining = record_count;

        let header = SnapshotHeader {
            version,
            created_at,
            revision,
            prefix,
        };
        Ok((header, record_count))
    }

    /// Read the next record payload, or `None` once every announced
    /// record has been read
    pub fn read_record(&mut self) -> Result<Option<&'a [u8]>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let tag_offset = self.offset;
        let tag = self.read_bytes(1)?[0];
        if tag != TAG_RECORD {
            return Err(SnapshotError::UnknownTag {
                offset: tag_offset,
                tag,
            });
        }

        let len = self.read_u32()? as usize;
        let payload = self.read_bytes(len)?;
        self.remaining -= 1;

        Ok(Some(payload))
    }

    /// Read and verify footer
    pub fn read_footer(&mut self) -> Result<()> {
        // Footer bytes don't update the checksum
        let end_marker = self.take(SNAPSHOT_END_MARKER.len())?;
        if end_marker != SNAPSHOT_END_MARKER {
            return Err(SnapshotError::InvalidEndMarker);
        }

        let stored = self.take(CHECKSUM_LEN)?;
        let computed = self.hasher.clone().finalize();
        if stored != computed.as_slice() {
            return Err(SnapshotError::ChecksumMismatch);
        }

        let trailing = self.bytes.len() - self.offset;
        if trailing > 0 {
            return Err(SnapshotError::TrailingBytes(trailing));
        }

        Ok(())
    }

    /// Bytes not yet consumed
    pub fn remaining_bytes(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len() - self.offset;
        if len > available {
            return Err(SnapshotError::Truncated {
                offset: self.offset,
                needed: len - available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read bytes and update checksum
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self.take(len)?;
        self.hasher.update(slice);
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_le_bytes)
    }
}

/// Decode a snapshot blob, checking only the envelope
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let mut reader = SnapshotReader::new(bytes);
    let (header, record_count) = reader.read_header()?;

    // A corrupt count must not drive a huge allocation
    let max_possible = reader.remaining_bytes() / RECORD_FRAME_LEN;
    let mut entries = Vec::with_capacity((record_count as usize).min(max_possible));
    while let Some(payload) = reader.read_record()? {
        entries.push(payload.to_vec());
    }

    reader.read_footer()?;
    debug!("Decoded snapshot with {} records", entries.len());

    Ok(Snapshot::from_entries(header, entries))
}

/// Decode a snapshot blob and every record inside it
pub fn decode_validated(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot = decode(bytes)?;
    snapshot.records()?;
    Ok(snapshot)
}

/// Read a snapshot file fully into memory and decode its envelope
pub async fn read_snapshot_file(path: &Path) -> Result<Snapshot> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SnapshotError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    decode(&bytes)
}
