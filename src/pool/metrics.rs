//! Pool Metrics Collection
//!
//! Atomic counters updated from workers and submitters; snapshots are
//! advisory, recomputed on demand, and never authoritative ledgers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Pool metrics collector
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    /// Tasks/sec, scaled by 1000 (sampled externally)
    throughput_milli: AtomicU64,
}

impl PoolMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Store the externally sampled throughput (tasks per second)
    pub fn set_throughput(&self, tasks_per_sec: f64) {
        self.throughput_milli
            .store((tasks_per_sec * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn throughput(&self) -> f64 {
        self.throughput_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }
}

/// Snapshot of pool metrics plus live gauges
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    /// Tasks ever submitted (including rejected ones)
    pub total_tasks: u64,
    /// Tasks that completed successfully
    pub completed: u64,
    /// Tasks that failed (timeouts included)
    pub failed: u64,
    /// Timeout-synthesized results
    pub timed_out: u64,
    /// Workers with at least one task in flight
    pub active_workers: usize,
    /// Entries waiting in the queue
    pub queued_tasks: usize,
    /// Sampled tasks/sec
    pub throughput_per_sec: f64,
}

// =============================================================================
// Tests
// =============================================================================
