//! Snapshot codec
//!
//! A snapshot is the portable capture of one range scan:
//! - Self-describing envelope with header, tagged records, footer
//! - SnapshotWriter for building snapshot blobs
//! - SnapshotReader for splitting them back into records
//! - File helpers used by the dump and restore pipelines

pub mod format;
pub mod reader;
pub mod writer;

pub use format::*;
pub use reader::*;
pub use writer::*;
