//! Error types for snapshot encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding snapshot blobs.
///
/// Every decode-side variant means the blob cannot be trusted. The replay
/// engine treats all of them identically: evict the entry and recompute.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The blob does not start with the snapshot magic bytes.
    #[error("bad snapshot magic: {found:02x?}")]
    BadMagic {
        /// The bytes found where the magic was expected.
        found: [u8; 4],
    },

    /// The snapshot format version is not supported.
    #[error("unsupported snapshot version: {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the frame header.
        found: u16,
        /// Version this build supports.
        supported: u16,
    },

    /// The blob is shorter than its header or declared payload.
    #[error("truncated snapshot: needed {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The CRC32 trailer does not match the frame contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the trailer.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },

    /// The frame's sequence does not match the boundary it was cached under.
    #[error("sequence mismatch: expected {expected}, found {found}")]
    SequenceMismatch {
        /// The boundary the caller expected.
        expected: u64,
        /// The sequence recorded in the frame.
        found: u64,
    },

    /// The blob is structurally invalid in some other way.
    #[error("corrupted snapshot: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Compression failed.
    #[error("compression failed: {message}")]
    Compress {
        /// Description of the failure.
        message: String,
    },

    /// Decompression failed.
    #[error("decompression failed: {message}")]
    Decompress {
        /// Description of the failure.
        message: String,
    },

    /// CBOR serialization of reducer state failed.
    #[error("state serialization failed: {message}")]
    Serialize {
        /// Description of the failure.
        message: String,
    },

    /// CBOR deserialization of reducer state failed.
    #[error("state deserialization failed: {message}")]
    Deserialize {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    /// Creates a corrupted-snapshot error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a compression error.
    pub fn compress(message: impl Into<String>) -> Self {
        Self::Compress {
            message: message.into(),
        }
    }

    /// Creates a decompression error.
    pub fn decompress(message: impl Into<String>) -> Self {
        Self::Decompress {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    /// Creates a deserialization error.
    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::Deserialize {
            message: message.into(),
        }
    }
}
