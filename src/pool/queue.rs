//! Priority Task Queue
//!
//! Pending work ordered by priority descending, with stable FIFO ordering
//! inside a priority level. Entries whose cancellation token has already
//! fired (timed out while queued) are dropped on pop instead of dispatched.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

use super::task::{Task, TaskHandler, TaskResult};

/// A queued unit of work awaiting a worker
pub(crate) struct QueuedTask {
    pub task: Task,
    pub handler: Arc<dyn TaskHandler>,
    pub result_tx: oneshot::Sender<TaskResult>,
    pub cancel: CancellationToken,
    pub enqueued_at: Instant,
    seq: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then lower sequence (earlier
        // submission) wins within a priority level.
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shared priority queue with async wait support
pub(crate) struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    seq: AtomicU64,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue a task and wake one waiting worker
    pub fn push(
        &self,
        task: Task,
        handler: Arc<dyn TaskHandler>,
        result_tx: oneshot::Sender<TaskResult>,
        cancel: CancellationToken,
    ) {
        let entry = QueuedTask {
            task,
            handler,
            result_tx,
            cancel,
            enqueued_at: Instant::now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.heap.lock().push(entry);
        self.notify.notify_one();
    }

    /// Pop the highest-priority live entry, discarding cancelled ones
    pub fn pop(&self) -> Option<QueuedTask> {
        let mut heap = self.heap.lock();
        while let Some(entry) = heap.pop() {
            if entry.cancel.is_cancelled() {
                // Timed out while queued; the submitter already has its result
                continue;
            }
            return Some(entry);
        }
        None
    }

    /// Pop, waiting for work; returns `None` once `shutdown` fires
    pub async fn pop_wait(&self, shutdown: &CancellationToken) -> Option<QueuedTask> {
        loop {
            if let Some(entry) = self.pop() {
                return Some(entry);
            }
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Queue depth (includes not-yet-discarded cancelled entries)
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Check if the queue holds no entries
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Drop every queued entry
    pub fn clear(&self) {
        self.heap.lock().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::task::{handler_fn, TaskKind};
    use proptest::prelude::*;
    use serde_json::json;

    fn noop_handler() -> Arc<dyn TaskHandler> {
        handler_fn(|_, _| async { Ok(json!(null)) })
    }

    fn push_task(queue: &TaskQueue, id: &str, priority: i32) -> CancellationToken {
        let (tx, _rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let task = Task::new(id, TaskKind::Cpu, json!(null)).with_priority(priority);
        queue.push(task, noop_handler(), tx, cancel.clone());
        cancel
    }

    #[test]
    fn test_priority_descending() {
        let queue = TaskQueue::new();
        push_task(&queue, "low", 1);
        push_task(&queue, "high", 5);
        push_task(&queue, "mid", 3);

        assert_eq!(queue.pop().unwrap().task.id, "high");
        assert_eq!(queue.pop().unwrap().task.id, "mid");
        assert_eq!(queue.pop().unwrap().task.id, "low");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = TaskQueue::new();
        push_task(&queue, "first", 2);
        push_task(&queue, "second", 2);
        push_task(&queue, "third", 2);

        assert_eq!(queue.pop().unwrap().task.id, "first");
        assert_eq!(queue.pop().unwrap().task.id, "second");
        assert_eq!(queue.pop().unwrap().task.id, "third");
    }

    #[test]
    fn test_negative_priority_allowed() {
        let queue = TaskQueue::new();
        push_task(&queue, "background", -10);
        push_task(&queue, "normal", 0);

        assert_eq!(queue.pop().unwrap().task.id, "normal");
        assert_eq!(queue.pop().unwrap().task.id, "background");
    }

    #[test]
    fn test_cancelled_entries_skipped() {
        let queue = TaskQueue::new();
        let cancel = push_task(&queue, "doomed", 9);
        push_task(&queue, "live", 1);

        cancel.cancel();
        assert_eq!(queue.pop().unwrap().task.id, "live");
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_pop_wait_wakes_on_push() {
        let queue = Arc::new(TaskQueue::new());
        let shutdown = CancellationToken::new();

        let waiter = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.pop_wait(&shutdown).await.map(|e| e.task.id) })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        push_task(&queue, "arrived", 0);

        let id = waiter.await.unwrap();
        assert_eq!(id.as_deref(), Some("arrived"));
    }

    #[tokio::test]
    async fn test_pop_wait_exits_on_shutdown() {
        let queue = Arc::new(TaskQueue::new());
        let shutdown = CancellationToken::new();

        let waiter = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.pop_wait(&shutdown).await.is_none() })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.cancel();
        assert!(waiter.await.unwrap());
    }

    proptest! {
        #[test]
        fn prop_pops_sorted_by_priority_then_fifo(priorities in proptest::collection::vec(-100i32..100, 1..64)) {
            let queue = TaskQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                push_task(&queue, &format!("t{}", i), *priority);
            }

            let mut popped: Vec<(i32, usize)> = Vec::new();
            while let Some(entry) = queue.pop() {
                let index: usize = entry.task.id[1..].parse().unwrap();
                popped.push((entry.task.priority, index));
            }

            prop_assert_eq!(popped.len(), priorities.len());
            for window in popped.windows(2) {
                let (p1, i1) = window[0];
                let (p2, i2) = window[1];
                // Priority descending; FIFO (ascending index) within a level
                prop_assert!(p1 > p2 || (p1 == p2 && i1 < i2));
            }
        }
    }
}
