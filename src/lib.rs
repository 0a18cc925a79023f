//! Strata - Tiered Caching and Priority Task Execution Core
//!
//! The shared infrastructure core behind the platform's collectors and
//! services: a two-tier cache (fast in-process tier plus an optional
//! networked shared tier) coupled with a priority task-execution pool
//! (bounded concurrent workers, timeouts, cooperative cancellation, batch
//! processing with retries and circuit breaking).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ Tiered Cache │◀──▶│  Worker Pool │───▶│   Metrics    │       │
//! │  │ (local +     │    │  (priority   │    │   Sampler    │       │
//! │  │  remote)     │    │   queue)     │    │              │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tasks populate and invalidate cache entries, and cache lookups are
//! themselves dispatched as pool tasks in several call sites, so the two
//! components share one configuration and metrics surface.
//!
//! # Modules
//!
//! - [`cache`] - Tiered cache: codec, local tier, remote tier, facade
//! - [`pool`] - Worker pool, priority queue, batch controller, rate shaping
//! - [`monitor`] - Periodic metrics sampler
//! - [`config`] - Configuration structs for every subsystem
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pool;

// Re-export commonly used types
pub use cache::{CacheHealth, CacheStats, InMemoryRemoteTier, RemoteTier, TieredCache};
pub use config::{BatchConfig, CacheConfig, CoreConfig, PoolConfig, SamplerConfig};
pub use error::{Error, Result};
pub use monitor::{SystemSample, SystemSampler};
pub use pool::{
    handler_fn, BatchController, BatchReport, Task, TaskHandler, TaskKind, TaskResult, WorkerPool,
};
