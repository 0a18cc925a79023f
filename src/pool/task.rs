//! Task Types and Handler Registry Support
//!
//! Tasks are tagged units of work: a caller-assigned id, a closed kind, an
//! opaque JSON payload, a priority, and an explicit timeout. Behavior is
//! bound to kinds through a handler registry validated at registration time,
//! so an unregistered kind fails at submission instead of at dispatch.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Recognized task kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// CPU-bound work
    Cpu,
    /// I/O-bound work
    Io,
    /// Memory-bound work
    Memory,
    /// Caller-defined operation
    Custom,
}

impl TaskKind {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Cpu => "cpu",
            TaskKind::Io => "io",
            TaskKind::Memory => "memory",
            TaskKind::Custom => "custom-operation",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A unit of work submitted to the pool
#[derive(Debug, Clone)]
pub struct Task {
    /// Caller-assigned unique id
    pub id: String,
    /// Task kind; must have a registered handler
    pub kind: TaskKind,
    /// Opaque payload handed to the handler
    pub payload: Value,
    /// Higher runs sooner; any integer
    pub priority: i32,
    /// Upper bound on the caller's wait; must be positive
    pub timeout: Duration,
}

impl Task {
    /// Create a task with priority 0 and a 30s timeout
    pub fn new(id: impl Into<String>, kind: TaskKind, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
            priority: 0,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The single terminal outcome of a submitted task
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Id of the originating task
    pub task_id: String,
    /// Whether the task completed successfully
    pub success: bool,
    /// Handler output on success
    pub data: Option<Value>,
    /// Failure message otherwise
    pub error: Option<String>,
    /// Wall-clock execution (or wait) duration
    pub duration: Duration,
}

impl TaskResult {
    pub(crate) fn completed(task_id: String, data: Value, duration: Duration) -> Self {
        Self {
            task_id,
            success: true,
            data: Some(data),
            error: None,
            duration,
        }
    }

    pub(crate) fn failed(task_id: String, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id,
            success: false,
            data: None,
            error: Some(error.into()),
            duration,
        }
    }

    pub(crate) fn timed_out(task_id: String, duration: Duration) -> Self {
        Self::failed(task_id, "timeout", duration)
    }

    /// Whether this result was synthesized by the pool's timeout timer
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error.as_deref() == Some("timeout")
    }
}

/// Behavior bound to a task kind.
///
/// Handlers receive a cancellation token that the pool cancels when the
/// task's timeout fires; long-running bodies should select on it.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the task body
    async fn run(&self, payload: Value, cancel: CancellationToken) -> Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Value, CancellationToken) -> BoxFuture<'static, Result<Value>> + Send + Sync,
{
    async fn run(&self, payload: Value, cancel: CancellationToken) -> Result<Value> {
        (self.0)(payload, cancel).await
    }
}

/// Wrap an async closure as a [`TaskHandler`].
///
/// ```
/// use strata::pool::handler_fn;
///
/// let handler = handler_fn(|payload, _cancel| async move { Ok(payload) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> std::sync::Arc<dyn TaskHandler>
where
    F: Fn(Value, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    std::sync::Arc::new(FnHandler(
        move |payload: Value, cancel: CancellationToken| -> BoxFuture<'static, Result<Value>> {
            Box::pin(f(payload, cancel))
        },
    ))
}

// =============================================================================
// Tests
// =============================================================================
