//! Strata Service Shell
//!
//! Boots the cache and pool core from CLI/env configuration, runs the
//! metrics sampler and an optional self-probe that exercises the cache
//! through the pool, and shuts down gracefully on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata::cache::{InMemoryRemoteTier, TieredCache};
use strata::config::{
    BatchConfig, CacheConfig, CodecConfig, CoreConfig, LocalTierConfig, PoolConfig, SamplerConfig,
};
use strata::error::Result;
use strata::monitor::SystemSampler;
use strata::pool::{handler_fn, Task, TaskKind, WorkerPool};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Strata - tiered caching and priority task execution core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum keys held by the local cache tier
    #[arg(long, env = "LOCAL_MAX_KEYS", default_value = "10000")]
    local_max_keys: usize,

    /// Default cache TTL in seconds
    #[arg(long, env = "DEFAULT_TTL_SECS", default_value = "300")]
    default_ttl_secs: u64,

    /// Expiry sweep interval in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "30")]
    sweep_interval_secs: u64,

    /// Disable payload compression
    #[arg(long, env = "DISABLE_COMPRESSION")]
    disable_compression: bool,

    /// Minimum serialized size (bytes) to compress
    #[arg(long, env = "COMPRESSION_MIN_BYTES", default_value = "1024")]
    compression_min_bytes: usize,

    /// Enable the shared remote tier (in-memory backend)
    #[arg(long, env = "REMOTE_TIER")]
    remote_tier: bool,

    /// Minimum worker count
    #[arg(long, env = "MIN_WORKERS", default_value = "2")]
    min_workers: usize,

    /// Maximum worker count
    #[arg(long, env = "MAX_WORKERS", default_value = "16")]
    max_workers: usize,

    /// Execution contexts reserved for the service itself
    #[arg(long, env = "RESERVED_PARALLELISM", default_value = "1")]
    reserved_parallelism: usize,

    /// Maximum in-flight tasks per worker
    #[arg(long, env = "TASKS_PER_WORKER", default_value = "4")]
    tasks_per_worker: usize,

    /// Default task timeout in seconds
    #[arg(long, env = "DEFAULT_TASK_TIMEOUT_SECS", default_value = "30")]
    default_task_timeout_secs: u64,

    /// Batch chunk size
    #[arg(long, env = "BATCH_SIZE", default_value = "50")]
    batch_size: usize,

    /// Retries per failed chunk
    #[arg(long, env = "RETRY_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,

    /// Base retry delay in milliseconds (linear backoff)
    #[arg(long, env = "RETRY_DELAY_MS", default_value = "100")]
    retry_delay_ms: u64,

    /// Consecutive chunk failures that open the circuit
    #[arg(long, env = "CIRCUIT_BREAKER_THRESHOLD", default_value = "5")]
    circuit_breaker_threshold: u32,

    /// Metrics sampling interval in seconds
    #[arg(long, env = "SAMPLE_INTERVAL_SECS", default_value = "15")]
    sample_interval_secs: u64,

    /// Self-probe interval in seconds (0 disables)
    #[arg(long, env = "PROBE_INTERVAL_SECS", default_value = "30")]
    probe_interval_secs: u64,

    /// Shutdown grace period in seconds
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "10")]
    shutdown_grace_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn core_config(&self) -> CoreConfig {
        CoreConfig {
            cache: CacheConfig {
                local: LocalTierConfig {
                    max_keys: self.local_max_keys,
                    default_ttl: Duration::from_secs(self.default_ttl_secs),
                    sweep_interval: Duration::from_secs(self.sweep_interval_secs),
                },
                codec: CodecConfig {
                    enabled: !self.disable_compression,
                    min_size_bytes: self.compression_min_bytes,
                    ..Default::default()
                },
            },
            pool: PoolConfig {
                min_workers: self.min_workers,
                max_workers: self.max_workers,
                reserved_parallelism: self.reserved_parallelism,
                tasks_per_worker: self.tasks_per_worker,
                default_timeout: Duration::from_secs(self.default_task_timeout_secs),
            },
            batch: BatchConfig {
                batch_size: self.batch_size,
                retry_attempts: self.retry_attempts,
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                circuit_breaker_threshold: self.circuit_breaker_threshold,
            },
            sampler: SamplerConfig {
                interval: Duration::from_secs(self.sample_interval_secs),
            },
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.core_config();

    info!("Starting Strata core");
    info!("  Local tier: {} keys max, {}s default TTL", config.cache.local.max_keys, args.default_ttl_secs);
    info!("  Remote tier: {}", if args.remote_tier { "enabled" } else { "disabled" });
    info!("  Compression: {} (min {} bytes)", config.cache.codec.enabled, config.cache.codec.min_size_bytes);
    info!("  Pool: {}-{} workers, {} tasks/worker", config.pool.min_workers, config.pool.max_workers, config.pool.tasks_per_worker);
    info!("  Batch: size {}, {} retries, breaker at {}", config.batch.batch_size, config.batch.retry_attempts, config.batch.circuit_breaker_threshold);

    let cache = if args.remote_tier {
        TieredCache::with_remote(config.cache.clone(), Arc::new(InMemoryRemoteTier::new()))
    } else {
        TieredCache::new(config.cache.clone())
    };
    let sweeper = cache.spawn_sweeper();

    let pool = Arc::new(WorkerPool::start(config.pool.clone()));
    info!("Pool sized to {} workers", pool.worker_count());

    register_probe_handler(&pool, &cache);

    let sampler = SystemSampler::new(config.sampler.clone(), Arc::clone(&pool), Arc::clone(&cache));
    let (_samples, sampler_handle) = sampler.spawn();

    let probe_handle = if args.probe_interval_secs > 0 {
        Some(spawn_probe(
            Arc::clone(&pool),
            Duration::from_secs(args.probe_interval_secs),
            config.pool.default_timeout,
        ))
    } else {
        None
    };

    info!("Core ready; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    if let Some(handle) = probe_handle {
        handle.abort();
    }
    pool.shutdown(Duration::from_secs(args.shutdown_grace_secs)).await;
    sampler_handle.abort();
    sweeper.abort();

    let stats = cache.stats();
    info!(
        "Final cache stats: {} hits, {} misses, {} keys",
        stats.hits, stats.misses, stats.key_count
    );

    Ok(())
}

/// Register the self-probe: a pool task that round-trips a value through the
/// cache, exercising the cache-through-pool path end to end.
fn register_probe_handler(pool: &Arc<WorkerPool>, cache: &Arc<TieredCache>) {
    let cache = Arc::clone(cache);
    pool.register_handler(
        TaskKind::Custom,
        handler_fn(move |payload, _cancel| {
            let cache = Arc::clone(&cache);
            async move {
                let key = payload["key"].as_str().unwrap_or("probe").to_string();
                cache.set(&key, &payload, Duration::from_secs(60)).await?;
                let read: Option<serde_json::Value> = cache.get(&key).await?;
                Ok(json!({ "ok": read.is_some() }))
            }
        }),
    );
}

fn spawn_probe(
    pool: Arc<WorkerPool>,
    interval: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let id = uuid::Uuid::new_v4().to_string();
            let task = Task::new(id, TaskKind::Custom, json!({ "key": "probe" }))
                .with_priority(-10)
                .with_timeout(timeout);

            let result = pool.submit(task).await;
            if !result.success {
                warn!(error = ?result.error, "self-probe failed");
            }
        }
    })
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata={}", level)));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
