//! Range reader: one prefix scan under a fixed time budget

use crate::error::{DumpError, Result};
use crate::record::Record;
use crate::store::KvSession;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Records returned by a prefix scan, in store order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedRange {
    /// Store revision the scan was served at
    pub revision: i64,
    pub records: Vec<Record>,
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Trailing `0xff` bytes are dropped and the last remaining byte is
/// incremented. A prefix made only of `0xff` bytes has no upper bound,
/// which etcd spells as `[0x00]`.
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last < 0xff {
            if let Some(byte) = end.last_mut() {
                *byte += 1;
            }
            return end;
        }
        end.pop();
    }
    vec![0]
}

/// Fetch every record whose key starts with `prefix`.
///
/// Issues exactly one range request. Expiry of `budget` is a
/// [`DumpError::Read`]; nothing is retried.
pub async fn read_range<S: KvSession>(
    session: &mut S,
    prefix: &[u8],
    budget: Duration,
) -> Result<ScannedRange> {
    if prefix.is_empty() {
        return Err(DumpError::read("prefix shouldn't be empty"));
    }

    let range_end = prefix_range_end(prefix);
    debug!(
        "Reading range [{}, {})",
        String::from_utf8_lossy(prefix),
        String::from_utf8_lossy(&range_end)
    );

    let response = match timeout(budget, session.range(prefix, &range_end)).await {
        Ok(response) => response?,
        Err(_) => {
            return Err(DumpError::read(format!(
                "range read timed out after {:?}",
                budget
            )))
        }
    };

    Ok(ScannedRange {
        revision: response.revision,
        records: response.records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, Credentials};
    use crate::store::{Connector, MemoryStore};

    #[test]
    fn test_prefix_range_end() {
        assert_eq!(prefix_range_end(b"a/"), b"a0".to_vec());
        assert_eq!(prefix_range_end(b"/"), b"0".to_vec());
        assert_eq!(prefix_range_end(&[b'a', 0xff]), b"b".to_vec());
        assert_eq!(prefix_range_end(&[0x01, 0xff, 0xff]), vec![0x02]);
        assert_eq!(prefix_range_end(&[0xff, 0xff]), vec![0]);
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("memory", Credentials::new("root", "pw"))
    }

    #[tokio::test]
    async fn test_read_range_scopes_to_prefix() {
        let store = MemoryStore::new();
        for key in ["a/1", "a/2", "a/3", "b/1", "a"] {
            store.insert(key, format!("value of {}", key));
        }
        let mut session = store.connect(&config()).await.unwrap();

        let scanned = read_range(&mut session, b"a/", Duration::from_secs(1))
            .await
            .unwrap();
        let keys: Vec<_> = scanned.records.iter().map(|r| r.key_str().into_owned()).collect();
        assert_eq!(keys, vec!["a/1", "a/2", "a/3"]);
        assert_eq!(scanned.revision, store.revision());
    }

    #[tokio::test]
    async fn test_read_range_rejects_empty_prefix() {
        let store = MemoryStore::new();
        let mut session = store.connect(&config()).await.unwrap();
        let err = read_range(&mut session, b"", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Read(_)));
    }

    #[tokio::test]
    async fn test_read_range_times_out() {
        let store = MemoryStore::new();
        store.insert("a/1", "v");
        let mut session = store.connect(&config()).await.unwrap();
        store.set_latency(Some(Duration::from_millis(500)));

        let err = read_range(&mut session, b"a/", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Read(_)));
    }
}
