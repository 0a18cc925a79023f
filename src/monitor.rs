//! System Metrics Sampler
//!
//! Periodically samples queue depth, active workers, throughput, and cache
//! hit rate into a watch channel. Samples are advisory snapshots, not an
//! authoritative ledger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::TieredCache;
use crate::config::SamplerConfig;
use crate::pool::WorkerPool;

/// One periodic snapshot of the whole core
#[derive(Debug, Clone, Default)]
pub struct SystemSample {
    /// Tasks waiting in the pool queue
    pub queued_tasks: usize,
    /// Workers with at least one task in flight
    pub active_workers: usize,
    /// Tasks completed since pool start
    pub tasks_completed: u64,
    /// Tasks failed since pool start (timeouts included)
    pub tasks_failed: u64,
    /// Completions per second over the last interval
    pub throughput_per_sec: f64,
    /// Cache hit rate
    pub cache_hit_rate: f64,
    /// Keys in the local cache tier
    pub cache_keys: usize,
    /// Payload bytes in the local cache tier
    pub cache_memory_bytes: u64,
}

/// Periodic sampler over a pool and a cache
pub struct SystemSampler {
    pool: Arc<WorkerPool>,
    cache: Arc<TieredCache>,
    interval: Duration,
}

impl SystemSampler {
    /// Create a sampler over the given components
    pub fn new(config: SamplerConfig, pool: Arc<WorkerPool>, cache: Arc<TieredCache>) -> Self {
        Self {
            pool,
            cache,
            interval: config.interval,
        }
    }

    /// Spawn the sampling loop.
    ///
    /// The loop exits when every receiver is dropped; the handle may also be
    /// aborted directly.
    pub fn spawn(self) -> (watch::Receiver<SystemSample>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(SystemSample::default());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately; skip it so the first sample
            // covers a full interval.
            ticker.tick().await;

            let mut last_completed = 0u64;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let pool = self.pool.metrics();
                let cache = self.cache.stats();

                let delta = pool.completed.saturating_sub(last_completed);
                last_completed = pool.completed;
                let throughput = delta as f64 / self.interval.as_secs_f64();
                self.pool.set_throughput(throughput);

                let sample = SystemSample {
                    queued_tasks: pool.queued_tasks,
                    active_workers: pool.active_workers,
                    tasks_completed: pool.completed,
                    tasks_failed: pool.failed,
                    throughput_per_sec: throughput,
                    cache_hit_rate: cache.hit_rate,
                    cache_keys: cache.key_count,
                    cache_memory_bytes: cache.memory_bytes,
                };

                debug!(
                    queued = sample.queued_tasks,
                    active = sample.active_workers,
                    completed = sample.tasks_completed,
                    failed = sample.tasks_failed,
                    throughput = format!("{:.1}/s", sample.throughput_per_sec),
                    hit_rate = format!("{:.2}", sample.cache_hit_rate),
                    cache_keys = sample.cache_keys,
                    "system sample"
                );

                let _ = tx.send(sample);
            }
        });

        (rx, handle)
    }
}

// =============================================================================
// Tests
// =============================================================================
