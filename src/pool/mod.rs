//! Priority Task Execution Pool
//!
//! Bounded concurrent workers with a priority queue, per-task timeouts,
//! cooperative cancellation, batch processing with retries and circuit
//! breaking, and rate-shaping helpers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Worker Pool                           │
//! │  ┌───────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │ submit()  │──▶│ Priority Queue │──▶│ Workers (fixed,  │  │
//! │  │ + timeout │   │ (desc, stable) │   │ per-worker caps) │  │
//! │  └───────────┘   └────────────────┘   └──────────────────┘  │
//! │        │                                      │              │
//! │        └──────── oneshot TaskResult ◀─────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers are bound to task kinds through a registry validated at
//! submission; timeouts are enforced by the pool, which cancels the task's
//! token and synthesizes the terminal result.

mod queue;
mod worker;
pub mod batch;
pub mod metrics;
pub mod shaping;
pub mod task;

pub use batch::{BatchController, BatchReport, ChunkFailure};
pub use metrics::{PoolMetrics, PoolSnapshot};
pub use shaping::{Debounce, Throttle};
pub use task::{handler_fn, Task, TaskHandler, TaskKind, TaskResult};
pub use worker::WorkerPool;
