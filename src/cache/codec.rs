//! Value Serialization and Compression
//!
//! Converts cached values to a storable byte form and LZ4-compresses
//! payloads above a size threshold, with automatic fallback on failure.
//!
//! # Example
//!
//! ```
//! use strata::cache::Codec;
//! use strata::config::CodecConfig;
//!
//! let codec = Codec::new(CodecConfig::default());
//! let (payload, compressed) = codec.encode(&"hello").unwrap();
//! let value: String = codec.decode(&payload, compressed).unwrap();
//! assert_eq!(value, "hello");
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CodecConfig;
use crate::error::{Error, Result};

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Human-readable algorithm name
    fn name(&self) -> &'static str;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// =============================================================================
// No-Op Compressor
// =============================================================================

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// LZ4 Compressor
// =============================================================================

/// LZ4 compressor (fast compression)
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    /// Create new LZ4 compressor with default settings
    pub fn new() -> Self {
        Self { level: 4 }
    }

    /// Create with custom compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Serializer/compressor for cache values.
///
/// Values are JSON-serialized; serialized payloads at or above the configured
/// threshold are LZ4-compressed. Compression that fails or does not shrink
/// the payload falls back to the raw serialized form.
pub struct Codec {
    config: CodecConfig,
    lz4: Lz4Compressor,
}

impl Codec {
    /// Create a codec with default configuration
    pub fn new(config: CodecConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            config,
        }
    }

    /// Serialize (and maybe compress) a value.
    ///
    /// Returns the payload bytes and whether they are compressed.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<(Bytes, bool)> {
        let raw = serde_json::to_vec(value)?;

        if !self.config.enabled || raw.len() < self.config.min_size_bytes {
            return Ok((Bytes::from(raw), false));
        }

        match self.lz4.compress(&raw) {
            // Only use compressed form if it is actually smaller
            Ok(compressed) if compressed.len() < raw.len() => {
                Ok((Bytes::from(compressed), true))
            }
            Ok(_) => Ok((Bytes::from(raw), false)),
            Err(e) => {
                tracing::warn!("Compression failed, storing uncompressed: {}", e);
                Ok((Bytes::from(raw), false))
            }
        }
    }

    /// Decompress (if needed) and deserialize a payload.
    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8], compressed: bool) -> Result<T> {
        if compressed {
            let raw = self.lz4.decompress(payload)?;
            Ok(serde_json::from_slice(&raw)?)
        } else {
            Ok(serde_json::from_slice(payload)?)
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
