//! Dump pipeline: connect, scan one prefix, build a snapshot, persist it

use crate::config::ConnectionConfig;
use crate::error::{DumpError, Result};
use crate::range::read_range;
use crate::record;
use crate::snapshot::{write_snapshot_file, Snapshot, SnapshotHeader};
use crate::store::{open_session, release, Connector};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// What to dump and where
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Key prefix selecting the range
    pub prefix: String,
    /// Snapshot file to create or overwrite; nothing is written when unset
    pub output: Option<PathBuf>,
    /// Print each key as it is processed
    pub verbose: bool,
}

impl DumpOptions {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            output: None,
            verbose: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Summary of a finished dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReport {
    pub records: usize,
    /// Total size of encoded record payloads
    pub payload_bytes: usize,
    /// Store revision the range was read at
    pub revision: i64,
    /// Where the snapshot went, with its size on disk
    pub output: Option<(PathBuf, u64)>,
}

/// Dump every key under `options.prefix`.
///
/// The snapshot is fully built in memory before any file is touched, so a
/// failed read never leaves a partial file behind. With `verbose` set each
/// key is written to `progress` on its own line, in scan order.
pub async fn dump<C, W>(
    connector: &C,
    config: &ConnectionConfig,
    options: &DumpOptions,
    progress: &mut W,
) -> Result<(Snapshot, DumpReport)>
where
    C: Connector,
    W: Write + Send,
{
    if options.prefix.is_empty() {
        return Err(DumpError::configuration("prefix shouldn't be empty"));
    }

    info!("Dumping prefix {:?} from {}", options.prefix, config.address);

    let mut session = open_session(connector, config).await?;
    let scanned = read_range(&mut session, options.prefix.as_bytes(), config.request_timeout).await;
    release(&mut session).await;
    let scanned = scanned?;

    let mut snapshot = Snapshot::new(SnapshotHeader::new(options.prefix.as_bytes(), scanned.revision));
    for kv in &scanned.records {
        snapshot.push(record::encode(kv));
        debug!("Captured {}", kv.key_str());
        if options.verbose {
            writeln!(progress, "{}", kv.key_str())?;
        }
    }
    progress.flush()?;

    let output = match &options.output {
        Some(path) => {
            let size = write_snapshot_file(path, &snapshot).await?;
            Some((path.clone(), size))
        }
        None => None,
    };

    let report = DumpReport {
        records: snapshot.len(),
        payload_bytes: snapshot.payload_bytes(),
        revision: scanned.revision,
        output,
    };
    info!(
        "Dumped {} keys at revision {}",
        report.records, report.revision
    );

    Ok((snapshot, report))
}
