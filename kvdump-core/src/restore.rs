//! Restore pipeline: replay a snapshot file as individual puts

use crate::config::ConnectionConfig;
use crate::error::{DumpError, Result};
use crate::record;
use crate::snapshot::{read_snapshot_file, Snapshot};
use crate::store::{open_session, release, Connector, KvSession};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Which snapshot to replay
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub input: PathBuf,
    /// Print each key as it is written
    pub verbose: bool,
}

impl RestoreOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Summary of a finished restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records written to the store
    pub records: usize,
    /// Store revision recorded in the snapshot header
    pub source_revision: i64,
}

/// Restore the snapshot at `options.input`.
///
/// The file is read and its envelope checked before any connection is
/// made. Records are then written one at a time in file order. The first
/// malformed record or failed put stops the restore; keys written before
/// that point stay written.
pub async fn restore<C, W>(
    connector: &C,
    config: &ConnectionConfig,
    options: &RestoreOptions,
    progress: &mut W,
) -> Result<RestoreReport>
where
    C: Connector,
    W: Write + Send,
{
    let snapshot = read_snapshot_file(&options.input).await?;
    info!(
        "Restoring {} records from {} (prefix {:?}, revision {}) to {}",
        snapshot.len(),
        options.input.display(),
        snapshot.header.prefix_str(),
        snapshot.header.revision,
        config.address
    );

    let mut session = open_session(connector, config).await?;
    let applied = apply_snapshot(
        &mut session,
        &snapshot,
        config.request_timeout,
        options.verbose,
        progress,
    )
    .await;
    release(&mut session).await;
    let records = applied?;

    info!("Restored {} keys", records);
    Ok(RestoreReport {
        records,
        source_revision: snapshot.header.revision,
    })
}

/// Write every record of `snapshot` through an open session.
///
/// Each put gets its own `budget`; expiry is a [`DumpError::Write`].
/// Returns the number of records written.
pub async fn apply_snapshot<S, W>(
    session: &mut S,
    snapshot: &Snapshot,
    budget: Duration,
    verbose: bool,
    progress: &mut W,
) -> Result<usize>
where
    S: KvSession,
    W: Write + Send,
{
    for (index, payload) in snapshot.entries().iter().enumerate() {
        let kv = record::decode(payload).map_err(|source| DumpError::Decode { index, source })?;

        match timeout(budget, session.put(&kv.key, &kv.value)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DumpError::write(
                    &kv.key,
                    format!("put timed out after {:?}", budget),
                ))
            }
        }

        debug!("Restored {}", kv.key_str());
        if verbose {
            writeln!(progress, "{}", kv.key_str())?;
        }
    }
    progress.flush()?;

    Ok(snapshot.len())
}
