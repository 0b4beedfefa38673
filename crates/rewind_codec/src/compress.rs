//! Pluggable lossless compression for snapshot payloads.

use crate::error::{CodecError, CodecResult};

/// A lossless compressor for snapshot payloads.
///
/// Implementations must satisfy `decompress(compress(x)) == x` for all
/// inputs; the frame layer verifies the declared uncompressed length after
/// every decompression.
pub trait Compressor: Send + Sync {
    /// Short algorithm name, used in telemetry and logs.
    fn name(&self) -> &'static str;

    /// Compresses `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying algorithm fails.
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    /// Decompresses `data`, which is expected to expand to
    /// `uncompressed_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a valid compressed stream.
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> CodecResult<Vec<u8>>;
}

/// Zstandard compression, the default snapshot compressor.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    /// Compression level (zstd levels 1-22; 3 balances ratio and speed).
    pub level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCompressor {
    /// Creates a compressor with an explicit level.
    #[must_use]
    pub const fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        zstd::bulk::compress(data, self.level).map_err(|e| CodecError::compress(e.to_string()))
    }

    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> CodecResult<Vec<u8>> {
        zstd::bulk::decompress(data, uncompressed_len)
            .map_err(|e| CodecError::decompress(e.to_string()))
    }
}

/// A pass-through compressor.
///
/// Useful when snapshot states are already small, and in tests that need to
/// corrupt payload bytes at known offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> CodecResult<Vec<u8>> {
        if data.len() != uncompressed_len {
            return Err(CodecError::decompress(format!(
                "noop payload is {} bytes, expected {}",
                data.len(),
                uncompressed_len
            )));
        }
        Ok(data.to_vec())
    }
}
