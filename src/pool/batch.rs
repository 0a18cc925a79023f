//! Batch Processing with Retries and Circuit Breaking
//!
//! Chunks large workloads, retries failed chunks with linear backoff, and
//! trips a circuit breaker after consecutive chunk failures to avoid
//! hammering a failing dependency.
//!
//! A chunk that exhausts its retries below the breaker threshold does not
//! fail the batch: its items are omitted from the results and the failure is
//! recorded in [`BatchReport::failures`]. Callers needing completeness must
//! check the report (or compare input and output cardinality) rather than
//! rely on the result list alone.

use std::future::Future;

use tracing::{debug, error, warn};

use crate::config::BatchConfig;
use crate::error::{Error, Result};

/// A chunk that exhausted its retries
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    /// Zero-based chunk index
    pub chunk_index: usize,
    /// Attempts made (initial try plus retries)
    pub attempts: u32,
    /// Final error message
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchReport<R> {
    /// Successful chunk outputs, concatenated in chunk order
    pub results: Vec<R>,
    /// Chunks dropped after exhausting retries
    pub failures: Vec<ChunkFailure>,
}

impl<R> BatchReport<R> {
    /// Whether every chunk succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<R> Default for BatchReport<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Chunked batch processor with retry and circuit-breaker control
pub struct BatchController {
    config: BatchConfig,
}

impl BatchController {
    /// Create a controller with the given configuration
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Process `items` in chunks through `processor`.
    ///
    /// Each chunk is attempted up to `1 + retry_attempts` times; attempt `n`
    /// is preceded by a `retry_delay * n` wait. Reaching
    /// `circuit_breaker_threshold` consecutive chunk failures aborts the
    /// whole call with [`Error::CircuitBreakerOpen`]; remaining chunks are
    /// never attempted.
    pub async fn process<T, R, F, Fut>(&self, items: Vec<T>, processor: F) -> Result<BatchReport<R>>
    where
        T: Clone,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>>>,
    {
        let chunk_size = self.config.batch_size.max(1);
        let mut report = BatchReport::default();
        let mut consecutive_failures = 0u32;

        let chunks: Vec<Vec<T>> = items.chunks(chunk_size).map(|c| c.to_vec()).collect();
        let total_chunks = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut attempts = 0u32;

            loop {
                attempts += 1;
                match processor(chunk.clone()).await {
                    Ok(mut outputs) => {
                        report.results.append(&mut outputs);
                        consecutive_failures = 0;
                        break;
                    }
                    Err(e) if attempts <= self.config.retry_attempts => {
                        let delay = self.config.retry_delay * attempts;
                        debug!(
                            chunk = index,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "chunk failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            chunk = index,
                            attempts,
                            consecutive = consecutive_failures,
                            error = %e,
                            "chunk dropped after exhausting retries"
                        );
                        report.failures.push(ChunkFailure {
                            chunk_index: index,
                            attempts,
                            error: e.to_string(),
                        });

                        if consecutive_failures >= self.config.circuit_breaker_threshold {
                            error!(
                                consecutive = consecutive_failures,
                                remaining_chunks = total_chunks - index - 1,
                                "circuit breaker open, aborting batch"
                            );
                            return Err(Error::CircuitBreakerOpen {
                                consecutive_failures,
                            });
                        }
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Get configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
