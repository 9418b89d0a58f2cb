//! kvdump core - prefix-range dump and restore for etcd v3
//!
//! This crate provides the building blocks behind the `kvdump` tool:
//! - Store sessions (etcd over gRPC, plus an in-process store)
//! - Prefix range reads with a bounded time budget
//! - Record and snapshot codecs
//! - Dump and restore pipelines

pub mod config;
pub mod dump;
pub mod error;
pub mod range;
pub mod record;
pub mod restore;
pub mod snapshot;
pub mod store;

pub use config::{ConnectionConfig, Credentials};
pub use dump::{dump, DumpOptions, DumpReport};
pub use error::{DumpError, Result};
pub use range::{prefix_range_end, read_range, ScannedRange};
pub use record::Record;
pub use restore::{apply_snapshot, restore, RestoreOptions, RestoreReport};
pub use snapshot::{Snapshot, SnapshotError, SnapshotHeader};
pub use store::{open_session, Connector, EtcdConnector, KvSession, MemoryStore};
