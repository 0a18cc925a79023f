//! Local Cache Tier
//!
//! In-process tier of record: a sharded map with per-key TTLs, a bounded key
//! count, and lazy plus swept expiry.
//!
//! # Design
//!
//! - Fixed power-of-two shard count; each shard guards its map with its own
//!   `RwLock`, so a write replaces the whole entry atomically and readers
//!   never observe a torn value.
//! - Capacity is a key-count bound. Overflowing inserts evict the entries
//!   with the earliest absolute expiry first (oldest-deadline-first, not
//!   strict LRU); expiry sweeps handle the steady-state reclamation.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use super::entry::CacheEntry;
use super::SHARD_COUNT;
use crate::config::LocalTierConfig;

struct Shard {
    map: RwLock<HashMap<String, CacheEntry>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

/// Local in-process cache tier
pub struct LocalCache {
    shards: Box<[Shard]>,
    config: LocalTierConfig,
    /// Total payload bytes currently held
    memory_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl LocalCache {
    /// Create a local tier with the given configuration
    pub fn new(config: LocalTierConfig) -> Self {
        let shards: Vec<Shard> = (0..SHARD_COUNT).map(|_| Shard::new()).collect();
        Self {
            shards: shards.into_boxed_slice(),
            config,
            memory_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_for(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Power-of-two shard count enables fast modulo via bitwise AND
        &self.shards[(hasher.finish() as usize) & (SHARD_COUNT - 1)]
    }

    /// Get an entry, enforcing expiry lazily.
    ///
    /// Expired entries are removed on discovery and reported as misses.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let shard = self.shard_for(key);
        let entry = { shard.map.read().get(key).cloned() };

        match entry {
            Some(e) if e.is_expired() => {
                let mut guard = shard.map.write();
                // Re-check under the write lock; a writer may have replaced it
                if guard.get(key).map(|e| e.is_expired()).unwrap_or(false) {
                    if let Some(removed) = guard.remove(key) {
                        self.memory_bytes
                            .fetch_sub(removed.size_bytes() as u64, Ordering::Relaxed);
                        self.expired.fetch_add(1, Ordering::Relaxed);
                    }
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(e) => {
                e.record_hit();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(e)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an entry, evicting earliest-deadline entries on overflow.
    ///
    /// Returns `false` only when the write is rejected outright
    /// (a zero-key capacity).
    pub fn insert(&self, key: String, entry: CacheEntry) -> bool {
        if self.config.max_keys == 0 {
            return false;
        }

        let replacing = {
            let shard = self.shard_for(&key);
            shard.map.read().contains_key(&key)
        };

        if !replacing {
            let len = self.len();
            if len >= self.config.max_keys {
                self.evict_earliest(len + 1 - self.config.max_keys);
            }
        }

        let size = entry.size_bytes() as u64;
        let shard = self.shard_for(&key);
        let old = shard.map.write().insert(key, entry);

        if let Some(old_entry) = old {
            let old_size = old_entry.size_bytes() as u64;
            if size >= old_size {
                self.memory_bytes.fetch_add(size - old_size, Ordering::Relaxed);
            } else {
                self.memory_bytes.fetch_sub(old_size - size, Ordering::Relaxed);
            }
        } else {
            self.memory_bytes.fetch_add(size, Ordering::Relaxed);
        }

        true
    }

    /// Remove an entry. Removing an absent key is a no-op returning `false`.
    pub fn delete(&self, key: &str) -> bool {
        let shard = self.shard_for(key);
        match shard.map.write().remove(key) {
            Some(removed) => {
                self.memory_bytes
                    .fetch_sub(removed.size_bytes() as u64, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Check if a key is present and unexpired
    pub fn contains(&self, key: &str) -> bool {
        let shard = self.shard_for(key);
        shard
            .map
            .read()
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    /// Remove every expired entry; returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0usize;
        let mut freed = 0u64;

        for shard in self.shards.iter() {
            let mut guard = shard.map.write();
            guard.retain(|_, entry| {
                if entry.is_expired() {
                    removed += 1;
                    freed += entry.size_bytes() as u64;
                    false
                } else {
                    true
                }
            });
        }

        if removed > 0 {
            self.memory_bytes.fetch_sub(freed, Ordering::Relaxed);
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "local tier sweep removed expired entries");
        }

        removed
    }

    /// Evict the `count` entries closest to (or past) their expiry.
    fn evict_earliest(&self, count: usize) {
        let mut candidates: Vec<(String, Option<Instant>)> = Vec::new();

        for shard in self.shards.iter() {
            let guard = shard.map.read();
            for (key, entry) in guard.iter() {
                candidates.push((key.clone(), entry.deadline()));
            }
        }

        // Earliest deadline first; entries with no finite deadline go last
        candidates.sort_by(|(_, a), (_, b)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        for (key, _) in candidates.into_iter().take(count) {
            if self.delete(&key) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Clear all entries
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.map.write().clear();
        }
        self.memory_bytes.store(0, Ordering::Relaxed);
    }

    /// Number of keys held (including not-yet-swept expired entries)
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    /// Check if the tier is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes held
    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    /// Hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Capacity-driven eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Expired-entry removal count (lazy and swept)
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Get configuration
    pub fn config(&self) -> &LocalTierConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
