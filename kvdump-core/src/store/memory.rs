//! In-process key-value store
//!
//! Behaves like a single etcd member closely enough to drive the pipelines
//! without a network: keys are kept sorted, every put bumps the store
//! revision and the key's version, and range reads return records with the
//! same metadata etcd would. Fault knobs let callers make the store
//! unreachable, slow, or reject writes after a number of puts.

use super::{Connector, KvSession, RangeResponse};
use crate::config::{ConnectionConfig, Credentials};
use crate::error::{DumpError, Result};
use crate::record::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Vec<u8>, Record>,
    revision: i64,
    users: Vec<Credentials>,
    open_sessions: usize,
    unreachable: bool,
    latency: Option<Duration>,
    /// Remaining puts accepted before writes are rejected
    put_budget: Option<usize>,
}

impl Inner {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.revision += 1;
        let revision = self.revision;
        let record = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Record {
                key: key.to_vec(),
                create_revision: revision,
                ..Default::default()
            });
        record.value = value.to_vec();
        record.mod_revision = revision;
        record.version += 1;
    }
}

/// Shared handle to an in-process store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store that accepts any credentials
    pub fn new() -> Self {
        Self::default()
    }

    /// Require authentication; once a user is added only known users connect
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.inner.lock().users.push(Credentials::new(username, password));
        self
    }

    /// Put a key directly, bypassing sessions
    pub fn insert(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.inner.lock().put(key.as_ref(), value.as_ref());
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .entries
            .get(key.as_ref())
            .map(|r| r.value.clone())
    }

    /// Full record for `key`, including revision metadata
    pub fn record(&self, key: impl AsRef<[u8]>) -> Option<Record> {
        self.inner.lock().entries.get(key.as_ref()).cloned()
    }

    /// Snapshot of all keys and values in key order
    pub fn contents(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(k, r)| (k.clone(), r.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn revision(&self) -> i64 {
        self.inner.lock().revision
    }

    /// Number of sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.inner.lock().open_sessions
    }

    /// Refuse new connections
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unreachable = unreachable;
    }

    /// Delay every connect, range and put by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().latency = latency;
    }

    /// Accept `count` more puts through sessions, then reject the rest
    pub fn fail_puts_after(&self, count: usize) {
        self.inner.lock().put_budget = Some(count);
    }

    fn latency(&self) -> Option<Duration> {
        self.inner.lock().latency
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Connector for MemoryStore {
    type Session = MemorySession;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MemorySession> {
        self.delay().await;

        let mut inner = self.inner.lock();
        if inner.unreachable {
            return Err(DumpError::connection(format!(
                "{} is unreachable",
                config.address
            )));
        }
        if !inner.users.is_empty() && !inner.users.contains(&config.credentials) {
            return Err(DumpError::connection(format!(
                "authentication failed for user {}",
                config.credentials.username
            )));
        }
        inner.open_sessions += 1;
        debug!("Opened in-process session to {}", config.address);

        Ok(MemorySession {
            store: self.clone(),
            open: true,
        })
    }
}

/// Session against a [`MemoryStore`]
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    open: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DumpError::connection("session is closed"))
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.store.inner.lock().open_sessions -= 1;
        }
    }
}

#[async_trait]
impl KvSession for MemorySession {
    async fn range(&mut self, key: &[u8], range_end: &[u8]) -> Result<RangeResponse> {
        self.ensure_open().map_err(|e| DumpError::read(e.to_string()))?;
        self.store.delay().await;

        let inner = self.store.inner.lock();
        // etcd treats a range_end of [0x00] as "every key >= key"
        let records = inner
            .entries
            .range(key.to_vec()..)
            .take_while(|(k, _)| range_end == [0u8].as_slice() || k.as_slice() < range_end)
            .map(|(_, r)| r.clone())
            .collect();

        Ok(RangeResponse {
            revision: inner.revision,
            records,
        })
    }

    async fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()
            .map_err(|e| DumpError::write(key, e.to_string()))?;
        self.store.delay().await;

        let mut inner = self.store.inner.lock();
        if let Some(remaining) = inner.put_budget.as_mut() {
            if *remaining == 0 {
                return Err(DumpError::write(key, "put rejected by store"));
            }
            *remaining -= 1;
        }
        inner.put(key, value);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
