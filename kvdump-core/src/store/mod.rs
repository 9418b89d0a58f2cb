//! Store sessions
//!
//! A [`Connector`] opens authenticated [`KvSession`]s against one endpoint.
//! Pipelines own exactly one session at a time and close it on every exit
//! path; implementations also release their connection on `Drop`.

pub mod etcd;
pub mod memory;

pub use etcd::EtcdConnector;
pub use memory::{MemorySession, MemoryStore};

use crate::config::ConnectionConfig;
use crate::error::{DumpError, Result};
use crate::record::Record;
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Raw result of one range request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeResponse {
    /// Store revision the range was served at
    pub revision: i64,
    /// Matching records in store order
    pub records: Vec<Record>,
}

/// Opens sessions to a store
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: KvSession;

    /// Open and authenticate one session.
    ///
    /// Callers bound this with the dial timeout, see [`open_session`].
    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Session>;
}

/// One open connection to a store
#[async_trait]
pub trait KvSession: Send {
    /// Fetch every key in `[key, range_end)`
    async fn range(&mut self, key: &[u8], range_end: &[u8]) -> Result<RangeResponse>;

    /// Write `key = value`, overwriting any existing value
    async fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Open a session, failing with [`DumpError::Connection`] when the dial
/// timeout elapses first.
pub async fn open_session<C: Connector>(
    connector: &C,
    config: &ConnectionConfig,
) -> Result<C::Session> {
    config.validate()?;
    debug!("Connecting to {}", config.address);

    match timeout(config.dial_timeout, connector.connect(config)).await {
        Ok(session) => session,
        Err(_) => Err(DumpError::connection(format!(
            "timed out connecting to {} after {:?}",
            config.address, config.dial_timeout
        ))),
    }
}

/// Close `session`, logging rather than surfacing a failure.
///
/// Used after the pipeline outcome is already decided so the original
/// error, if any, is what the caller sees.
pub(crate) async fn release<S: KvSession>(session: &mut S) {
    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }
}
