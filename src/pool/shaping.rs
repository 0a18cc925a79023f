//! Rate-Shaping Combinators
//!
//! Debounce and throttle wrappers used to shape call frequency in front of
//! the pool (commonly layered over `submit`). Pure call-shaping: the only
//! state is the per-wrapper timer bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Default)]
struct DebounceState {
    /// Bumped on every call; a timer only fires if it is still the latest
    generation: u64,
    /// Calls observed in the current burst
    burst_calls: u32,
}

/// Defers invocation until a quiet period elapses.
///
/// Every call restarts the quiet timer. With the leading edge enabled the
/// first call of a burst fires immediately; with the trailing edge enabled
/// (the default) one invocation fires once the burst goes quiet. A
/// single-call burst that already fired on the leading edge does not fire
/// again on the trailing edge.
pub struct Debounce<F> {
    f: Arc<F>,
    quiet: Duration,
    leading: bool,
    trailing: bool,
    state: Arc<Mutex<DebounceState>>,
}

impl<F> Debounce<F>
where
    F: Fn() + Send + Sync + 'static,
{
    /// Create a trailing-edge debouncer
    pub fn new(quiet: Duration, f: F) -> Self {
        Self {
            f: Arc::new(f),
            quiet,
            leading: false,
            trailing: true,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Enable or disable the leading edge
    pub fn leading(mut self, on: bool) -> Self {
        self.leading = on;
        self
    }

    /// Enable or disable the trailing edge
    pub fn trailing(mut self, on: bool) -> Self {
        self.trailing = on;
        self
    }

    /// Record a call, firing per the configured edges.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self) {
        let (generation, fire_leading) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let first_of_burst = state.burst_calls == 0;
            state.burst_calls += 1;
            (state.generation, first_of_burst && self.leading)
        };

        if fire_leading {
            (self.f)();
        }

        let state = Arc::clone(&self.state);
        let f = Arc::clone(&self.f);
        let quiet = self.quiet;
        let leading = self.leading;
        let trailing = self.trailing;

        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;

            let fire = {
                let mut state = state.lock();
                if state.generation != generation {
                    // A later call restarted the quiet period
                    return;
                }
                let calls = state.burst_calls;
                state.burst_calls = 0;
                trailing && !(leading && calls == 1)
            };

            if fire {
                f();
            }
        });
    }
}

#[derive(Default)]
struct ThrottleState {
    window_start: Option<Instant>,
    fired_leading: bool,
    trailing_armed: bool,
}

enum ThrottleAction {
    FireNow,
    ArmTrailing(Duration),
    Drop,
}

/// Invokes at most once per fixed window.
///
/// Fires on the leading edge by default; with the trailing edge enabled the
/// first suppressed call arms one invocation at the end of the window.
pub struct Throttle<F> {
    f: Arc<F>,
    window: Duration,
    leading: bool,
    trailing: bool,
    state: Arc<Mutex<ThrottleState>>,
}

impl<F> Throttle<F>
where
    F: Fn() + Send + Sync + 'static,
{
    /// Create a leading-edge throttle
    pub fn new(window: Duration, f: F) -> Self {
        Self {
            f: Arc::new(f),
            window,
            leading: true,
            trailing: false,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Enable or disable the leading edge
    pub fn leading(mut self, on: bool) -> Self {
        self.leading = on;
        self
    }

    /// Enable or disable the trailing edge
    pub fn trailing(mut self, on: bool) -> Self {
        self.trailing = on;
        self
    }

    /// Record a call, firing per the configured edges.
    ///
    /// Must be called from within a tokio runtime when the trailing edge is
    /// enabled.
    pub fn call(&self) {
        let now = Instant::now();

        let action = {
            let mut state = self.state.lock();
            let window_live = state
                .window_start
                .map(|start| now.duration_since(start) < self.window)
                .unwrap_or(false);

            if !window_live {
                state.window_start = Some(now);
                state.fired_leading = false;
                state.trailing_armed = false;
            }

            if self.leading && !state.fired_leading {
                state.fired_leading = true;
                ThrottleAction::FireNow
            } else if self.trailing && !state.trailing_armed {
                state.trailing_armed = true;
                let start = state.window_start.unwrap_or(now);
                ThrottleAction::ArmTrailing(
                    (start + self.window).saturating_duration_since(now),
                )
            } else {
                ThrottleAction::Drop
            }
        };

        match action {
            ThrottleAction::FireNow => (self.f)(),
            ThrottleAction::ArmTrailing(remaining) => {
                let f = Arc::clone(&self.f);
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    tokio::time::sleep(remaining).await;
                    state.lock().trailing_armed = false;
                    f();
                });
            }
            ThrottleAction::Drop => {}
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debounce_trailing_fires_once_per_burst() {
        let (count, f) = counter();
        let debounce = Debounce::new(Duration::from_millis(30), f);

        for _ in 0..5 {
            debounce.call();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debounce_leading_fires_immediately() {
        let (count, f) = counter();
        let debounce = Debounce::new(Duration::from_millis(30), f)
            .leading(true)
            .trailing(false);

        debounce.call();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debounce.call();
        debounce.call();
        tokio::time::sleep(Duration::from_millis(60)).await;
        // Trailing disabled: nothing more fires for this burst
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Burst over; next call leads again
        debounce.call();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debounce_leading_and_trailing_single_call() {
        let (count, f) = counter();
        let debounce = Debounce::new(Duration::from_millis(20), f).leading(true);

        // One isolated call fires the leading edge only
        debounce.call();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_debounce_leading_and_trailing_burst() {
        let (count, f) = counter();
        let debounce = Debounce::new(Duration::from_millis(20), f).leading(true);

        debounce.call();
        debounce.call();
        debounce.call();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Leading edge plus one trailing invocation
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_throttle_leading_once_per_window() {
        let (count, f) = counter();
        let throttle = Throttle::new(Duration::from_millis(50), f);

        for _ in 0..5 {
            throttle.call();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        throttle.call();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_throttle_trailing_fires_at_window_end() {
        let (count, f) = counter();
        let throttle = Throttle::new(Duration::from_millis(40), f)
            .leading(false)
            .trailing(true);

        throttle.call();
        throttle.call();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_throttle_leading_and_trailing() {
        let (count, f) = counter();
        let throttle = Throttle::new(Duration::from_millis(40), f).trailing(true);

        throttle.call(); // leading
        throttle.call(); // arms trailing
        throttle.call(); // dropped
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
