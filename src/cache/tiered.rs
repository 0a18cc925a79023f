//! Tiered Cache Facade
//!
//! Composes the local tier of record with an optional remote tier:
//! read-through with promotion, remote-first write-through, batch
//! operations, and aggregated statistics.
//!
//! Remote-tier failures never propagate to callers; they are logged,
//! counted, and the cache degrades to local-only operation. No transactional
//! ordering exists across tiers: concurrent writers race, and the last write
//! to complete a tier wins in that tier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::codec::Codec;
use super::entry::CacheEntry;
use super::local::LocalCache;
use super::remote::{RemoteTier, RemoteWrite};
use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Aggregate cache statistics (advisory, not a ledger)
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Reads served from either tier
    pub hits: u64,
    /// Reads that missed both tiers
    pub misses: u64,
    /// `hits / (hits + misses)`
    pub hit_rate: f64,
    /// Keys held by the local tier
    pub key_count: usize,
    /// Payload bytes held by the local tier
    pub memory_bytes: u64,
    /// Capacity-driven local evictions
    pub evictions: u64,
    /// Expired entries removed (lazily or by sweep)
    pub expired: u64,
    /// Remote operations that failed and were degraded
    pub remote_errors: u64,
}

/// Per-tier health report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHealth {
    /// Local tier health (in-process, healthy unless capacity is zero)
    pub local: bool,
    /// Remote tier reachability; `None` when the tier is disabled
    pub remote: Option<bool>,
}

/// Two-tier cache facade
pub struct TieredCache {
    local: LocalCache,
    remote: Option<Arc<dyn RemoteTier>>,
    codec: Codec,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    remote_errors: AtomicU64,
}

impl TieredCache {
    /// Create a local-only cache
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Create a cache with a remote second tier
    pub fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteTier>) -> Arc<Self> {
        Self::build(config, Some(remote))
    }

    fn build(config: CacheConfig, remote: Option<Arc<dyn RemoteTier>>) -> Arc<Self> {
        Arc::new(Self {
            local: LocalCache::new(config.local.clone()),
            codec: Codec::new(config.codec.clone()),
            remote,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            remote_errors: AtomicU64::new(0),
        })
    }

    /// Spawn the background expiry sweeper.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped; the returned handle may be kept or discarded.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.local.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.local.sweep();
                    }
                    None => break,
                }
            }
        })
    }

    /// Store a value under `key` with the given TTL.
    ///
    /// Writes the remote tier first when one is configured, degrading on
    /// failure; the local tier is the tier of record. Returns `Ok(false)`
    /// only when the local write is rejected.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<bool> {
        let (payload, compressed) = self.codec.encode(value)?;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(key, payload.clone(), ttl, compressed).await {
                self.note_remote_error("set", &e);
            }
        }

        let stored = self
            .local
            .insert(key.to_string(), CacheEntry::new(payload, ttl, compressed));
        if !stored {
            warn!(key, "local tier rejected write");
        }
        Ok(stored)
    }

    /// Read a value, checking the local tier first.
    ///
    /// A remote hit is promoted into the local tier with a TTL derived from
    /// the remote entry's remaining lifetime (or the default TTL when the
    /// backend does not report one).
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if let Some(entry) = self.local.get(key) {
            let value = self.codec.decode(entry.payload(), entry.compressed())?;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }

        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(found)) => {
                    let value = self.codec.decode(&found.payload, found.compressed)?;
                    self.promote(key, found.payload, found.remaining_ttl, found.compressed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => self.note_remote_error("get", &e),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Delete `key` from both tiers.
    ///
    /// Idempotent: deleting an absent key returns `Ok(false)`.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut deleted = self.local.delete(key);

        if let Some(remote) = &self.remote {
            match remote.delete(key).await {
                Ok(remote_deleted) => deleted = deleted || remote_deleted,
                Err(e) => self.note_remote_error("delete", &e),
            }
        }

        Ok(deleted)
    }

    /// Drop every entry from both tiers.
    pub async fn clear(&self) -> Result<()> {
        self.local.clear();

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.clear().await {
                self.note_remote_error("clear", &e);
            }
        }
        Ok(())
    }

    /// Batched read; the result order matches `keys`.
    ///
    /// Local misses are fetched from the remote tier in a single pipelined
    /// round trip and promoted on hit.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Result<Vec<Option<T>>> {
        let mut results: Vec<Option<T>> = Vec::with_capacity(keys.len());
        let mut missing: Vec<(usize, String)> = Vec::new();

        for (index, key) in keys.iter().enumerate() {
            match self.local.get(key) {
                Some(entry) => {
                    let value = self.codec.decode(entry.payload(), entry.compressed())?;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    results.push(Some(value));
                }
                None => {
                    missing.push((index, key.clone()));
                    results.push(None);
                }
            }
        }

        if let Some(remote) = &self.remote {
            if !missing.is_empty() {
                let remote_keys: Vec<String> = missing.iter().map(|(_, k)| k.clone()).collect();
                match remote.mget(&remote_keys).await {
                    Ok(found) => {
                        for ((index, key), entry) in missing.iter().zip(found) {
                            if let Some(entry) = entry {
                                let value =
                                    self.codec.decode(&entry.payload, entry.compressed)?;
                                self.promote(
                                    key,
                                    entry.payload,
                                    entry.remaining_ttl,
                                    entry.compressed,
                                );
                                self.hits.fetch_add(1, Ordering::Relaxed);
                                results[*index] = Some(value);
                            }
                        }
                    }
                    Err(e) => self.note_remote_error("mget", &e),
                }
            }
        }

        let final_misses = results.iter().filter(|r| r.is_none()).count() as u64;
        self.misses.fetch_add(final_misses, Ordering::Relaxed);

        Ok(results)
    }

    /// Batched write with a shared TTL; one pipelined remote round trip.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], ttl: Duration) -> Result<()> {
        let mut encoded: Vec<(String, bytes::Bytes, bool)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let (payload, compressed) = self.codec.encode(value)?;
            encoded.push((key.clone(), payload, compressed));
        }

        if let Some(remote) = &self.remote {
            let writes = encoded
                .iter()
                .map(|(key, payload, compressed)| RemoteWrite {
                    key: key.clone(),
                    payload: payload.clone(),
                    ttl,
                    compressed: *compressed,
                })
                .collect();
            if let Err(e) = remote.mset(writes).await {
                self.note_remote_error("mset", &e);
            }
        }

        for (key, payload, compressed) in encoded {
            if !self.local.insert(key.clone(), CacheEntry::new(payload, ttl, compressed)) {
                warn!(key = %key, "local tier rejected batched write");
            }
        }
        Ok(())
    }

    /// Aggregate statistics snapshot
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            key_count: self.local.len(),
            memory_bytes: self.local.memory_bytes(),
            evictions: self.local.evictions(),
            expired: self.local.expired(),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
        }
    }

    /// Per-tier health probe
    pub async fn health_check(&self) -> CacheHealth {
        let remote = match &self.remote {
            Some(remote) => Some(remote.ping().await.is_ok()),
            None => None,
        };

        CacheHealth {
            local: self.config.local.max_keys > 0,
            remote,
        }
    }

    /// Whether a remote tier is configured
    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Force an expiry sweep; returns the number of entries removed.
    pub fn sweep_now(&self) -> usize {
        self.local.sweep()
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn promote(
        &self,
        key: &str,
        payload: bytes::Bytes,
        remaining_ttl: Option<Duration>,
        compressed: bool,
    ) {
        let ttl = remaining_ttl.unwrap_or(self.config.local.default_ttl);
        debug!(key, ttl_ms = ttl.as_millis() as u64, "promoting remote hit into local tier");
        self.local
            .insert(key.to_string(), CacheEntry::new(payload, ttl, compressed));
    }

    fn note_remote_error(&self, op: &str, error: &Error) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, %error, "remote tier operation failed, continuing local-only");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::remote::InMemoryRemoteTier;
    use crate::config::{CodecConfig, LocalTierConfig};

    fn local_only() -> Arc<TieredCache> {
        TieredCache::new(CacheConfig::default())
    }

    fn with_memory_remote() -> (Arc<TieredCache>, Arc<InMemoryRemoteTier>) {
        let remote = Arc::new(InMemoryRemoteTier::new());
        let cache = TieredCache::with_remote(CacheConfig::default(), remote.clone());
        (cache, remote)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = local_only();

        assert!(cache.set("k", &42u32, Duration::from_secs(60)).await.unwrap());
        let value: Option<u32> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let cache = local_only();
        let value: Option<String> = cache.get("absent").await.unwrap();
        assert!(value.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_enforced() {
        let cache = local_only();
        cache.set("k", &"v", Duration::from_millis(20)).await.unwrap();

        let before: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(before.as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let after: Option<String> = cache.get("k").await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_write_through_to_remote() {
        let (cache, remote) = with_memory_remote();

        cache.set("k", &7i64, Duration::from_secs(60)).await.unwrap();
        assert_eq!(remote.len(), 1);
    }

    #[tokio::test]
    async fn test_promotion_survives_remote_outage() {
        let (cache, remote) = with_memory_remote();

        // Seed the remote tier only
        remote
            .set(
                "remote-only",
                bytes::Bytes::from(serde_json::to_vec(&"payload").unwrap()),
                Duration::from_secs(60),
                false,
            )
            .await
            .unwrap();

        // First read promotes into the local tier
        let value: Option<String> = cache.get("remote-only").await.unwrap();
        assert_eq!(value.as_deref(), Some("payload"));

        // Remote goes dark; the promoted copy still serves reads
        remote.set_unreachable(true);
        let value: Option<String> = cache.get("remote-only").await.unwrap();
        assert_eq!(value.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_degrades_when_remote_fails() {
        let (cache, remote) = with_memory_remote();
        remote.set_unreachable(true);

        // Neither set nor get fails while the local tier is healthy
        assert!(cache.set("k", &1u8, Duration::from_secs(60)).await.unwrap());
        let value: Option<u8> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(1));

        let stats = cache.stats();
        assert!(stats.remote_errors >= 1);
    }

    #[tokio::test]
    async fn test_delete_both_tiers_and_idempotence() {
        let (cache, remote) = with_memory_remote();

        cache.set("k", &"v", Duration::from_secs(60)).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert!(remote.is_empty());

        // Deleting an absent key is a defined no-op
        assert!(!cache.delete("k").await.unwrap());
        assert!(!cache.delete("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let (cache, remote) = with_memory_remote();

        for i in 0..5 {
            cache
                .set(&format!("k{}", i), &i, Duration::from_secs(60))
                .await
                .unwrap();
        }

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().key_count, 0);
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn test_mget_order_matches_keys() {
        let (cache, remote) = with_memory_remote();

        cache.set("local", &"l", Duration::from_secs(60)).await.unwrap();
        remote
            .set(
                "remote",
                bytes::Bytes::from(serde_json::to_vec(&"r").unwrap()),
                Duration::from_secs(60),
                false,
            )
            .await
            .unwrap();

        let keys = vec!["local".to_string(), "missing".to_string(), "remote".to_string()];
        let values: Vec<Option<String>> = cache.mget(&keys).await.unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_deref(), Some("l"));
        assert!(values[1].is_none());
        assert_eq!(values[2].as_deref(), Some("r"));

        // The remote hit was promoted
        remote.set_unreachable(true);
        let promoted: Option<String> = cache.get("remote").await.unwrap();
        assert_eq!(promoted.as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn test_mget_single_remote_round_trip() {
        let (cache, remote) = with_memory_remote();

        for i in 0..4 {
            remote
                .set(
                    &format!("k{}", i),
                    bytes::Bytes::from(serde_json::to_vec(&i).unwrap()),
                    Duration::from_secs(60),
                    false,
                )
                .await
                .unwrap();
        }

        let reads_before = remote.reads();
        let keys: Vec<String> = (0..4).map(|i| format!("k{}", i)).collect();
        let values: Vec<Option<i32>> = cache.mget(&keys).await.unwrap();

        assert!(values.iter().all(|v| v.is_some()));
        assert_eq!(remote.reads(), reads_before + 1);
    }

    #[tokio::test]
    async fn test_mset() {
        let (cache, remote) = with_memory_remote();

        let entries: Vec<(String, i32)> = (0..6).map(|i| (format!("k{}", i), i)).collect();
        cache.mset(&entries, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.stats().key_count, 6);
        assert_eq!(remote.len(), 6);
        // One pipelined round trip
        assert_eq!(remote.writes(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = local_only();

        cache.set("k", &"v", Duration::from_secs(60)).await.unwrap();
        let _: Option<String> = cache.get("k").await.unwrap();
        let _: Option<String> = cache.get("miss").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.key_count, 1);
        assert!(stats.memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let cache = local_only();
        let health = cache.health_check().await;
        assert!(health.local);
        assert_eq!(health.remote, None);

        let (cache, remote) = with_memory_remote();
        assert_eq!(cache.health_check().await.remote, Some(true));

        remote.set_unreachable(true);
        assert_eq!(cache.health_check().await.remote, Some(false));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired() {
        let config = CacheConfig {
            local: LocalTierConfig {
                sweep_interval: Duration::from_millis(20),
                ..Default::default()
            },
            codec: CodecConfig::default(),
        };
        let cache = TieredCache::new(config);
        let _sweeper = cache.spawn_sweeper();

        cache.set("k", &"v", Duration::from_millis(30)).await.unwrap();
        assert_eq!(cache.stats().key_count, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.stats().key_count, 0);
        assert!(cache.stats().expired >= 1);
    }

    #[tokio::test]
    async fn test_large_values_round_trip_compressed() {
        let cache = local_only();
        let value = "abcdefgh".repeat(1024);

        cache.set("big", &value, Duration::from_secs(60)).await.unwrap();
        // Stored form is smaller than the serialized value
        assert!(cache.stats().memory_bytes < value.len() as u64);

        let read: Option<String> = cache.get("big").await.unwrap();
        assert_eq!(read.as_deref(), Some(value.as_str()));
    }
}
