//! Worker Pool
//!
//! A fixed-size set of concurrent workers pulling from the shared priority
//! queue. Each worker enforces its own in-flight cap; the pool owns timeout
//! enforcement and cooperative cancellation.
//!
//! # Task lifecycle
//!
//! ```text
//! Submitted → Queued → Running → { Completed | Failed | TimedOut }
//! ```
//!
//! Every submission yields exactly one [`TaskResult`]. When a task's timeout
//! fires the pool synthesizes the `TimedOut` result and cancels the task's
//! token; a handler still executing must observe the token to stop early,
//! and any late output it produces is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics::{PoolMetrics, PoolSnapshot};
use super::queue::{QueuedTask, TaskQueue};
use super::task::{Task, TaskHandler, TaskKind, TaskResult};
use crate::config::PoolConfig;

struct PoolInner {
    config: PoolConfig,
    queue: TaskQueue,
    handlers: RwLock<HashMap<TaskKind, Arc<dyn TaskHandler>>>,
    metrics: PoolMetrics,
    /// Per-worker in-flight counts
    worker_load: Vec<Arc<AtomicUsize>>,
    in_flight_total: AtomicUsize,
    shutdown: CancellationToken,
    accepting: AtomicBool,
}

/// Priority task execution pool
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Start a pool sized from the configuration.
    ///
    /// Worker count is hardware parallelism minus the configured reserve,
    /// clamped to `[min_workers, max_workers]`.
    pub fn start(config: PoolConfig) -> Self {
        let worker_count = config.effective_workers();
        let worker_load: Vec<Arc<AtomicUsize>> = (0..worker_count)
            .map(|_| Arc::new(AtomicUsize::new(0)))
            .collect();

        let inner = Arc::new(PoolInner {
            queue: TaskQueue::new(),
            handlers: RwLock::new(HashMap::new()),
            metrics: PoolMetrics::new(),
            worker_load,
            in_flight_total: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
            accepting: AtomicBool::new(true),
            config,
        });

        let workers = (0..worker_count)
            .map(|index| {
                let inner = Arc::clone(&inner);
                tokio::spawn(worker_loop(index, inner))
            })
            .collect();

        info!(workers = worker_count, "worker pool started");

        Self {
            inner,
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    /// Bind behavior to a task kind.
    ///
    /// Kinds are validated at submission against this registry; replacing a
    /// handler is allowed but logged.
    pub fn register_handler(&self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        if self.inner.handlers.write().insert(kind, handler).is_some() {
            warn!(kind = %kind, "replaced existing task handler");
        }
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Submit a task and wait for its single terminal result.
    ///
    /// Resolves when the task completes or its own timeout elapses,
    /// whichever is first; it never waits indefinitely. Invalid tasks
    /// (unknown kind, non-positive timeout) fail immediately and are never
    /// queued.
    pub async fn submit(&self, task: Task) -> TaskResult {
        let inner = &self.inner;
        inner.metrics.record_submitted();

        if !inner.accepting.load(Ordering::Acquire) {
            inner.metrics.record_failed();
            return TaskResult::failed(task.id, "worker pool is shut down", Duration::ZERO);
        }

        if task.timeout.is_zero() {
            inner.metrics.record_failed();
            return TaskResult::failed(task.id, "timeout must be positive", Duration::ZERO);
        }

        let handler = match inner.handlers.read().get(&task.kind) {
            Some(handler) => Arc::clone(handler),
            None => {
                inner.metrics.record_failed();
                return TaskResult::failed(
                    task.id,
                    format!("unknown task kind: {}", task.kind),
                    Duration::ZERO,
                );
            }
        };

        let task_id = task.id.clone();
        let timeout = task.timeout;
        let submitted_at = Instant::now();

        let (result_tx, result_rx) = oneshot::channel();
        let cancel = inner.shutdown.child_token();
        inner.queue.push(task, handler, result_tx, cancel.clone());

        match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Sender dropped without a result: shutdown raced the task
                inner.metrics.record_failed();
                TaskResult::failed(task_id, "task abandoned during shutdown", submitted_at.elapsed())
            }
            Err(_) => {
                cancel.cancel();
                inner.metrics.record_timed_out();
                warn!(
                    task_id = %task_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "task timed out; cancellation signalled"
                );
                TaskResult::timed_out(task_id, submitted_at.elapsed())
            }
        }
    }

    /// Metrics snapshot plus live gauges
    pub fn metrics(&self) -> PoolSnapshot {
        let inner = &self.inner;
        PoolSnapshot {
            total_tasks: inner.metrics.submitted(),
            completed: inner.metrics.completed(),
            failed: inner.metrics.failed(),
            timed_out: inner.metrics.timed_out(),
            active_workers: inner
                .worker_load
                .iter()
                .filter(|load| load.load(Ordering::Relaxed) > 0)
                .count(),
            queued_tasks: inner.queue.len(),
            throughput_per_sec: inner.metrics.throughput(),
        }
    }

    /// Store the externally sampled throughput (tasks per second)
    pub fn set_throughput(&self, tasks_per_sec: f64) {
        self.inner.metrics.set_throughput(tasks_per_sec);
    }

    /// Stop accepting tasks, wait up to `grace` for in-flight work, then
    /// cancel whatever remains. Idempotent.
    pub async fn shutdown(&self, grace: Duration) {
        if self.inner.accepting.swap(false, Ordering::AcqRel) {
            info!(grace_ms = grace.as_millis() as u64, "worker pool shutting down");
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            let drained = self.inner.queue.is_empty()
                && self.inner.in_flight_total.load(Ordering::Acquire) == 0;
            if drained {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.inner.shutdown.cancel();
        self.inner.queue.clear();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in &handles {
            handle.abort();
        }
        let _ = join_all(handles).await;

        info!("worker pool stopped");
    }
}

async fn worker_loop(index: usize, inner: Arc<PoolInner>) {
    let cap = Arc::new(Semaphore::new(inner.config.tasks_per_worker.max(1)));
    let load = Arc::clone(&inner.worker_load[index]);

    loop {
        // Respect this worker's in-flight cap before pulling work
        let permit = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            permit = Arc::clone(&cap).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = match inner.queue.pop_wait(&inner.shutdown).await {
            Some(job) => job,
            None => break,
        };

        load.fetch_add(1, Ordering::AcqRel);
        inner.in_flight_total.fetch_add(1, Ordering::AcqRel);

        let inner = Arc::clone(&inner);
        let load = Arc::clone(&load);
        tokio::spawn(async move {
            let _permit = permit;
            execute_task(index, job, &inner).await;
            load.fetch_sub(1, Ordering::AcqRel);
            inner.in_flight_total.fetch_sub(1, Ordering::AcqRel);
        });
    }

    debug!(worker = index, "worker loop exited");
}

async fn execute_task(worker: usize, job: QueuedTask, inner: &PoolInner) {
    let task_id = job.task.id.clone();
    let kind = job.task.kind;
    let queued_ms = job.enqueued_at.elapsed().as_millis() as u64;
    let started = Instant::now();

    debug!(worker, task_id = %task_id, kind = %kind, priority = job.task.priority, queued_ms, "task dispatched");

    let outcome = tokio::select! {
        _ = job.cancel.cancelled() => None,
        result = job.handler.run(job.task.payload, job.cancel.clone()) => Some(result),
    };
    let duration = started.elapsed();

    let result = match outcome {
        None => {
            // Timeout fired mid-flight; the submitter already holds the
            // synthesized result, so there is nothing left to report.
            debug!(task_id = %task_id, "task cancelled mid-flight");
            return;
        }
        Some(Ok(data)) => {
            inner.metrics.record_completed();
            debug!(task_id = %task_id, duration_ms = duration.as_millis() as u64, "task completed");
            TaskResult::completed(task_id, data, duration)
        }
        Some(Err(error)) => {
            inner.metrics.record_failed();
            warn!(task_id = %task_id, %error, duration_ms = duration.as_millis() as u64, "task failed");
            TaskResult::failed(task_id, error.to_string(), duration)
        }
    };

    // Receiver may already be gone (timed out between completion and send)
    let _ = job.result_tx.send(result);
}

// =============================================================================
// Tests
// =============================================================================
