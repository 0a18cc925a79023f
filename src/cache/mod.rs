//! Tiered Cache System
//!
//! Two-tier caching with a fast in-process tier and an optional networked
//! shared tier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Tiered Cache Facade                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Local Tier (in-process)        │  Remote Tier (optional)    │
//! │  ┌──────────────────────────┐   │  ┌──────────────────────┐  │
//! │  │ Sharded map, bounded     │   │  │ Pluggable backend    │  │
//! │  │ keys, per-key TTL, sweep │   │  │ (pipelined mget/mset)│  │
//! │  └──────────────────────────┘   │  └──────────────────────┘  │
//! │            │                    │            │               │
//! │            └──── promotion on remote hit ────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The local tier is the tier of record: remote failures degrade to
//! local-only operation and are surfaced through stats and health checks,
//! never to callers. Values are serialized and, above a size threshold,
//! LZ4-compressed before they are stored in either tier.

mod entry;
mod local;
mod tiered;
pub mod codec;
pub mod remote;

pub use codec::{Codec, Compressor, Lz4Compressor, NoopCompressor};
pub use entry::CacheEntry;
pub use local::LocalCache;
pub use remote::{InMemoryRemoteTier, RemoteEntry, RemoteTier, RemoteWrite};
pub use tiered::{CacheHealth, CacheStats, TieredCache};

/// Number of local-tier shards (power of two for fast modulo)
pub const SHARD_COUNT: usize = 64;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_count_is_power_of_two() {
        // Power of 2 enables fast modulo via bitwise AND
        assert!(SHARD_COUNT.is_power_of_two());
    }
}
