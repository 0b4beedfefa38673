//! # Rewind Codec
//!
//! Checkpoint snapshot framing and compression for Rewind.
//!
//! A checkpoint blob is a framed, compressed CBOR serialization of reducer
//! state at a sequence boundary:
//!
//! ```text
//! +-------+---------+----------+------------------+-------------+---------+-------+
//! | magic | version | sequence | uncompressed len | payload len | payload | crc32 |
//! +-------+---------+----------+------------------+-------------+---------+-------+
//! ```
//!
//! Decoding must reproduce the exact state that replaying every event up to
//! the boundary would produce, so the pipeline is strictly lossless:
//! CBOR (`serde` + `ciborium`) for the state, a pluggable [`Compressor`]
//! for the payload, and a CRC32 trailer to detect corruption before the
//! payload is ever trusted.
//!
//! ## Usage
//!
//! ```rust
//! use rewind_codec::{decode_snapshot, encode_snapshot, ZstdCompressor};
//!
//! let compressor = ZstdCompressor::default();
//! let blob = encode_snapshot(1000, &vec![1u32, 2, 3], &compressor).unwrap();
//! let state: Vec<u32> = decode_snapshot(1000, &blob.bytes, &compressor).unwrap();
//! assert_eq!(state, vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compress;
mod error;
mod frame;
mod state;

pub use compress::{Compressor, NoopCompressor, ZstdCompressor};
pub use error::{CodecError, CodecResult};
pub use frame::{compute_crc32, decode_frame, encode_frame, SnapshotFrame, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use state::{decode_state, encode_state};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A fully encoded checkpoint snapshot blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBlob {
    /// The framed, compressed snapshot bytes.
    pub bytes: Bytes,
    /// Size of the serialized state before compression.
    pub uncompressed_len: u64,
}

/// Serializes, compresses, and frames reducer state at a sequence boundary.
///
/// # Errors
///
/// Returns an error if CBOR serialization or compression fails.
pub fn encode_snapshot<S: Serialize>(
    sequence: u64,
    state: &S,
    compressor: &dyn Compressor,
) -> CodecResult<SnapshotBlob> {
    let serialized = encode_state(state)?;
    let uncompressed_len = serialized.len() as u64;
    let compressed = compressor.compress(&serialized)?;
    let framed = encode_frame(sequence, uncompressed_len, &compressed)?;
    Ok(SnapshotBlob {
        bytes: Bytes::from(framed),
        uncompressed_len,
    })
}

/// Decodes a snapshot blob back into reducer state.
///
/// `expected_sequence` guards against a blob being attached to the wrong
/// boundary; a mismatch is treated as corruption.
///
/// # Errors
///
/// Returns an error if the frame is malformed, the checksum does not match,
/// the sequence disagrees, decompression fails, or CBOR deserialization
/// fails.
pub fn decode_snapshot<S: DeserializeOwned>(
    expected_sequence: u64,
    bytes: &[u8],
    compressor: &dyn Compressor,
) -> CodecResult<S> {
    let frame = decode_frame(bytes)?;
    if frame.sequence != expected_sequence {
        return Err(CodecError::SequenceMismatch {
            expected: expected_sequence,
            found: frame.sequence,
        });
    }
    let serialized = compressor.decompress(frame.payload, frame.uncompressed_len as usize)?;
    if serialized.len() as u64 != frame.uncompressed_len {
        return Err(CodecError::corrupted(format!(
            "decompressed to {} bytes, frame declared {}",
            serialized.len(),
            frame.uncompressed_len
        )));
    }
    decode_state(&serialized)
}
