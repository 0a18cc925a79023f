//! Remote Cache Tier
//!
//! Optional networked second tier behind a pluggable backend trait. The
//! facade treats the remote tier as an unreliable, eventually consistent
//! peer: failures degrade reads and writes to local-only operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{Error, Result};

/// An entry read back from the remote tier
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    /// Serialized (possibly compressed) payload
    pub payload: Bytes,
    /// Lifetime left at the backend, when it reports one
    pub remaining_ttl: Option<Duration>,
    /// Whether the payload is compressed
    pub compressed: bool,
}

/// A single write destined for the remote tier
#[derive(Debug, Clone)]
pub struct RemoteWrite {
    pub key: String,
    pub payload: Bytes,
    pub ttl: Duration,
    pub compressed: bool,
}

/// Remote tier backend trait
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Get an entry
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>>;

    /// Store an entry with a TTL
    async fn set(&self, key: &str, payload: Bytes, ttl: Duration, compressed: bool) -> Result<()>;

    /// Delete an entry, reporting whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Drop every entry
    async fn clear(&self) -> Result<()>;

    /// Batched get, one round trip where the backend supports pipelining.
    ///
    /// The result order matches `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<RemoteEntry>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Batched set, one round trip where the backend supports pipelining.
    async fn mset(&self, writes: Vec<RemoteWrite>) -> Result<()> {
        for write in writes {
            self.set(&write.key, write.payload, write.ttl, write.compressed)
                .await?;
        }
        Ok(())
    }

    /// Reachability probe
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// In-Memory Backend
// =============================================================================

struct StoredValue {
    payload: Bytes,
    deadline: Option<Instant>,
    compressed: bool,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// In-memory remote tier for tests and single-process deployments.
///
/// Uses `DashMap` for lock-free concurrent access. An outage can be injected
/// with [`InMemoryRemoteTier::set_unreachable`] to rehearse degradation.
pub struct InMemoryRemoteTier {
    store: DashMap<String, StoredValue>,
    unreachable: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl Default for InMemoryRemoteTier {
    fn default() -> Self {
        Self {
            store: DashMap::new(),
            unreachable: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl InMemoryRemoteTier {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate (or clear) a backend outage.
    ///
    /// While unreachable every operation returns
    /// [`Error::RemoteUnavailable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::Relaxed) {
            Err(Error::RemoteUnavailable("backend unreachable".into()))
        } else {
            Ok(())
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the backend holds no entries
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Read operations served
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Write operations served
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Delete operations served
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RemoteTier for InMemoryRemoteTier {
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>> {
        self.check_reachable()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        if let Some(stored) = self.store.get(key) {
            if stored.is_expired() {
                drop(stored);
                self.store.remove(key);
                return Ok(None);
            }
            let remaining = stored
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now()));
            return Ok(Some(RemoteEntry {
                payload: stored.payload.clone(),
                remaining_ttl: remaining,
                compressed: stored.compressed,
            }));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration, compressed: bool) -> Result<()> {
        self.check_reachable()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        self.store.insert(
            key.to_string(),
            StoredValue {
                payload,
                deadline: Instant::now().checked_add(ttl),
                compressed,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_reachable()?;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.check_reachable()?;
        self.store.clear();
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<RemoteEntry>>> {
        self.check_reachable()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let found = match self.store.get(key.as_str()) {
                Some(stored) if !stored.is_expired() => {
                    let remaining = stored
                        .deadline
                        .map(|d| d.saturating_duration_since(Instant::now()));
                    Some(RemoteEntry {
                        payload: stored.payload.clone(),
                        remaining_ttl: remaining,
                        compressed: stored.compressed,
                    })
                }
                _ => None,
            };
            results.push(found);
        }
        Ok(results)
    }

    async fn mset(&self, writes: Vec<RemoteWrite>) -> Result<()> {
        self.check_reachable()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        for write in writes {
            self.store.insert(
                write.key,
                StoredValue {
                    payload: write.payload,
                    deadline: Instant::now().checked_add(write.ttl),
                    compressed: write.compressed,
                },
            );
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_set_get() {
        let tier = InMemoryRemoteTier::new();

        tier.set("k", Bytes::from_static(b"v"), Duration::from_secs(60), false)
            .await
            .unwrap();

        let entry = tier.get("k").await.unwrap().unwrap();
        assert_eq!(entry.payload.as_ref(), b"v");
        assert!(!entry.compressed);
        assert!(entry.remaining_ttl.unwrap() > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_expiry() {
        let tier = InMemoryRemoteTier::new();

        tier.set("k", Bytes::from_static(b"v"), Duration::from_millis(20), false)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(tier.get("k").await.unwrap().is_none());
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let tier = InMemoryRemoteTier::new();

        tier.set("k", Bytes::from_static(b"v"), Duration::from_secs(60), false)
            .await
            .unwrap();

        assert!(tier.delete("k").await.unwrap());
        assert!(!tier.delete("k").await.unwrap());
        assert!(tier.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mget_preserves_order() {
        let tier = InMemoryRemoteTier::new();

        tier.set("a", Bytes::from_static(b"1"), Duration::from_secs(60), false)
            .await
            .unwrap();
        tier.set("c", Bytes::from_static(b"3"), Duration::from_secs(60), false)
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = tier.mget(&keys).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().payload.as_ref(), b"1");
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().payload.as_ref(), b"3");
    }

    #[tokio::test]
    async fn test_mset() {
        let tier = InMemoryRemoteTier::new();

        let writes = (0..5)
            .map(|i| RemoteWrite {
                key: format!("k{}", i),
                payload: Bytes::from(vec![i as u8]),
                ttl: Duration::from_secs(60),
                compressed: false,
            })
            .collect();

        tier.mset(writes).await.unwrap();
        assert_eq!(tier.len(), 5);
        // One pipelined round trip, not five
        assert_eq!(tier.writes(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_fails_everything() {
        let tier = InMemoryRemoteTier::new();
        tier.set_unreachable(true);

        assert_matches!(tier.ping().await, Err(Error::RemoteUnavailable(_)));
        assert_matches!(tier.get("k").await, Err(Error::RemoteUnavailable(_)));
        assert_matches!(
            tier.set("k", Bytes::new(), Duration::from_secs(1), false).await,
            Err(Error::RemoteUnavailable(_))
        );

        tier.set_unreachable(false);
        assert!(tier.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = InMemoryRemoteTier::new();
        for i in 0..10 {
            tier.set(
                &format!("k{}", i),
                Bytes::from_static(b"v"),
                Duration::from_secs(60),
                false,
            )
            .await
            .unwrap();
        }

        tier.clear().await.unwrap();
        assert!(tier.is_empty());
    }
}
