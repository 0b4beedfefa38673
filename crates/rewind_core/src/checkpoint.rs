//! Checkpoint data model.

use bytes::Bytes;
use rewind_log::SequenceNumber;
use std::time::Instant;

/// An immutable compressed snapshot of reduced state at a sequence boundary.
///
/// Decoding a checkpoint must reproduce the exact state obtainable by
/// replaying every event in `[0, sequence]` through the reducer from the
/// initial state. Checkpoints are created lazily, the first time a seek's
/// delta range crosses an uncached boundary, and are destroyed only by
/// cache eviction. LRU recency is bookkeeping owned by the cache, not by
/// the checkpoint itself.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    sequence: SequenceNumber,
    blob: Bytes,
    uncompressed_len: u64,
    created_at: Instant,
}

impl Checkpoint {
    /// Creates a checkpoint from an encoded snapshot blob.
    #[must_use]
    pub fn new(sequence: SequenceNumber, blob: Bytes, uncompressed_len: u64) -> Self {
        Self {
            sequence,
            blob,
            uncompressed_len,
            created_at: Instant::now(),
        }
    }

    /// The sequence boundary this checkpoint captures.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// The framed, compressed snapshot bytes.
    #[must_use]
    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    /// Size of the serialized state before compression.
    ///
    /// This is the cache's accounting unit: it bounds the real cost of
    /// decompressing and holding the state, independent of how well the
    /// payload compressed.
    #[must_use]
    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }

    /// Size of the compressed blob, including framing.
    #[must_use]
    pub fn compressed_len(&self) -> u64 {
        self.blob.len() as u64
    }

    /// When this checkpoint was materialized.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}
