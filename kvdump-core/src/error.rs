//! Error types shared by the dump and restore pipelines

use crate::snapshot::SnapshotError;
use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DumpError>;

/// Every failure a pipeline invocation can report.
///
/// None of these are recovered internally: the first error aborts the
/// invocation and is handed back to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("decode error in record {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: prost::DecodeError,
    },

    #[error("snapshot format error: {0}")]
    SnapshotFormat(#[from] SnapshotError),

    #[error("write error for key {key:?}: {reason}")]
    Write { key: String, reason: String },

    #[error("failed to write snapshot to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write progress output: {0}")]
    Progress(#[from] std::io::Error),
}

impl DumpError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DumpError::Configuration(msg.into())
    }

    /// Create a connection error with a custom message
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DumpError::Connection(msg.into())
    }

    /// Create a read error with a custom message
    pub fn read<S: Into<String>>(msg: S) -> Self {
        DumpError::Read(msg.into())
    }

    /// Create a write error for `key`
    pub fn write<S: Into<String>>(key: &[u8], reason: S) -> Self {
        DumpError::Write {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: reason.into(),
        }
    }
}
