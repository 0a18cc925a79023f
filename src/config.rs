//! Configuration surface for the cache and pool core.
//!
//! Every subsystem takes a plain config struct with sensible defaults; the
//! service binary assembles them from CLI flags and environment variables.

use std::time::Duration;

/// Serializer/compressor configuration
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Enable compression of serialized payloads
    pub enabled: bool,
    /// Minimum serialized size to compress (smaller payloads stay raw)
    pub min_size_bytes: usize,
    /// Compression level (algorithm-specific)
    pub level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size_bytes: 1024, // 1KB minimum
            level: 4,
        }
    }
}

/// Local cache tier configuration
#[derive(Debug, Clone)]
pub struct LocalTierConfig {
    /// Maximum number of keys held by the local tier
    pub max_keys: usize,
    /// TTL applied when no explicit TTL is available (e.g. promotion fallback)
    pub default_ttl: Duration,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
}

impl Default for LocalTierConfig {
    fn default() -> Self {
        Self {
            max_keys: 10_000,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Tiered cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Local tier settings
    pub local: LocalTierConfig,
    /// Serializer/compressor settings
    pub codec: CodecConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Lower bound on worker count
    pub min_workers: usize,
    /// Upper bound on worker count
    pub max_workers: usize,
    /// Execution contexts reserved for the caller (subtracted from parallelism)
    pub reserved_parallelism: usize,
    /// Maximum in-flight tasks per worker
    pub tasks_per_worker: usize,
    /// Timeout for submissions that do not choose their own
    pub default_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 16,
            reserved_parallelism: 1,
            tasks_per_worker: 4,
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Worker count derived from hardware parallelism minus the reserve,
    /// clamped to `[min_workers, max_workers]`.
    pub fn effective_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(self.min_workers.max(1));

        let lo = self.min_workers.max(1);
        let hi = self.max_workers.max(lo);
        available
            .saturating_sub(self.reserved_parallelism)
            .clamp(lo, hi)
    }
}

/// Batch controller configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items per chunk
    pub batch_size: usize,
    /// Retries per chunk after the initial attempt
    pub retry_attempts: u32,
    /// Base retry delay; attempt `n` waits `retry_delay * n` (linear backoff)
    pub retry_delay: Duration,
    /// Consecutive chunk failures that open the circuit
    pub circuit_breaker_threshold: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            circuit_breaker_threshold: 5,
        }
    }
}

/// Metrics sampler configuration
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Interval between samples
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

/// Top-level configuration for the whole core
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Tiered cache settings
    pub cache: CacheConfig,
    /// Worker pool settings
    pub pool: PoolConfig,
    /// Batch controller settings
    pub batch: BatchConfig,
    /// Metrics sampler settings
    pub sampler: SamplerConfig,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.cache.local.max_keys, 10_000);
        assert_eq!(config.cache.codec.min_size_bytes, 1024);
        assert_eq!(config.pool.tasks_per_worker, 4);
        assert_eq!(config.batch.batch_size, 50);
        assert_eq!(config.sampler.interval, Duration::from_secs(15));
    }

    #[test]
    fn test_effective_workers_respects_bounds() {
        let config = PoolConfig {
            min_workers: 2,
            max_workers: 4,
            reserved_parallelism: 0,
            ..Default::default()
        };
        let n = config.effective_workers();
        assert!((2..=4).contains(&n));
    }

    #[test]
    fn test_effective_workers_never_zero() {
        let config = PoolConfig {
            min_workers: 0,
            max_workers: 0,
            reserved_parallelism: 1024,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn test_effective_workers_min_wins_over_reserve() {
        let config = PoolConfig {
            min_workers: 3,
            max_workers: 8,
            reserved_parallelism: 10_000,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 3);
    }
}
