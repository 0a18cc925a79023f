//! Cache Entry Types

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// A single cached payload with its expiry bookkeeping.
///
/// Each tier owns its entries outright; promotion between tiers inserts a
/// fresh entry with a recomputed TTL rather than sharing one by reference.
pub struct CacheEntry {
    /// Serialized (possibly compressed) payload
    payload: Bytes,
    /// When the entry was stored
    stored_at: Instant,
    /// Relative time-to-live; `stored_at + ttl` is the absolute expiry
    ttl: Duration,
    /// Whether the payload is compressed
    compressed: bool,
    /// Reads served from this entry
    hit_count: AtomicU64,
}

impl CacheEntry {
    /// Create a new entry stamped at the current instant
    pub fn new(payload: Bytes, ttl: Duration, compressed: bool) -> Self {
        Self {
            payload,
            stored_at: Instant::now(),
            ttl,
            compressed,
            hit_count: AtomicU64::new(0),
        }
    }

    /// Get the payload (zero-copy)
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload size in bytes
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is compressed
    #[inline]
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// Configured TTL
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Absolute expiry instant, `None` if the TTL overflows the clock
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.stored_at.checked_add(self.ttl)
    }

    /// TTL still remaining, zero once expired
    pub fn remaining_ttl(&self) -> Duration {
        match self.deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => self.ttl,
        }
    }

    /// Check if the entry has passed its absolute expiry
    #[inline]
    pub fn is_expired(&self) -> bool {
        match self.deadline() {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Record a read and return the new hit count
    #[inline]
    pub fn record_hit(&self) -> u64 {
        self.hit_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reads served from this entry
    #[inline]
    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }
}

impl Clone for CacheEntry {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            stored_at: self.stored_at,
            ttl: self.ttl,
            compressed: self.compressed,
            hit_count: AtomicU64::new(self.hit_count.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("size_bytes", &self.size_bytes())
            .field("ttl", &self.ttl)
            .field("compressed", &self.compressed)
            .field("hit_count", &self.hit_count())
            .field("is_expired", &self.is_expired())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(Bytes::from_static(b"payload"), ttl, false)
    }

    #[test]
    fn test_entry_creation() {
        let entry = make_entry(Duration::from_secs(60));
        assert_eq!(entry.size_bytes(), 7);
        assert!(!entry.compressed());
        assert_eq!(entry.hit_count(), 0);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiry() {
        let entry = make_entry(Duration::from_millis(20));
        assert!(!entry.is_expired());

        std::thread::sleep(Duration::from_millis(30));
        assert!(entry.is_expired());
        assert_eq!(entry.remaining_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_remaining_ttl_shrinks() {
        let entry = make_entry(Duration::from_secs(60));
        let first = entry.remaining_ttl();
        std::thread::sleep(Duration::from_millis(15));
        let second = entry.remaining_ttl();
        assert!(second < first);
        assert!(second > Duration::from_secs(50));
    }

    #[test]
    fn test_hit_tracking() {
        let entry = make_entry(Duration::from_secs(60));
        assert_eq!(entry.record_hit(), 1);
        assert_eq!(entry.record_hit(), 2);
        assert_eq!(entry.hit_count(), 2);
    }

    #[test]
    fn test_clone_carries_hits() {
        let entry = make_entry(Duration::from_secs(60));
        entry.record_hit();
        entry.record_hit();

        let cloned = entry.clone();
        assert_eq!(cloned.hit_count(), 2);
        assert_eq!(cloned.payload().as_ref(), b"payload");
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let entry = make_entry(Duration::MAX);
        assert!(!entry.is_expired());
    }
}
