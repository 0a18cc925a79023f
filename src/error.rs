//! Error types for the Strata core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache and pool core
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// Local tier rejected a write (fatal to the call)
    #[error("Local cache write rejected for key '{key}': {reason}")]
    CacheWrite { key: String, reason: String },

    /// Remote tier unreachable or failing (non-fatal, causes degradation)
    #[error("Remote tier unavailable: {0}")]
    RemoteUnavailable(String),

    // =========================================================================
    // Pool Errors
    // =========================================================================
    /// Task kind has no registered handler (never queued)
    #[error("Unknown task kind: {0}")]
    UnknownTaskKind(String),

    /// Task rejected before queuing
    #[error("Invalid task '{id}': {reason}")]
    InvalidTask { id: String, reason: String },

    /// Pool is no longer accepting tasks
    #[error("Worker pool is shut down")]
    PoolShutdown,

    // =========================================================================
    // Batch Errors
    // =========================================================================
    /// Too many consecutive chunk failures (fatal to the remaining batch)
    #[error("Circuit breaker open after {consecutive_failures} consecutive chunk failures")]
    CircuitBreakerOpen { consecutive_failures: u32 },

    /// A chunk exhausted its retries (recorded per chunk, not raised)
    #[error("Chunk {index} failed after {attempts} attempts: {reason}")]
    ChunkFailed {
        index: usize,
        attempts: u32,
        reason: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
