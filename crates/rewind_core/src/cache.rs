//! Memory-bounded, LRU-evicted checkpoint cache.

use crate::checkpoint::Checkpoint;
use parking_lot::Mutex;
use rewind_log::SequenceNumber;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of offering a checkpoint to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The checkpoint is now resident.
    Inserted,
    /// A checkpoint at this boundary was already resident; the offer was
    /// discarded.
    AlreadyPresent,
    /// The checkpoint alone exceeds the memory threshold and can never be
    /// cached. Not an error: the seek that produced it still succeeded.
    TooLarge,
}

/// A checkpoint removed by eviction, reported for telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evicted {
    /// Boundary of the evicted checkpoint.
    pub sequence: SequenceNumber,
    /// How long the checkpoint was resident.
    pub resident_age: Duration,
    /// Bytes it released from the budget.
    pub uncompressed_len: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of resident checkpoints.
    pub resident: usize,
    /// Total accounted bytes of resident checkpoints.
    pub resident_bytes: u64,
    /// Lookups that found a usable checkpoint, since last reset.
    pub hits: u64,
    /// Lookups that found nothing at or before the target, since last reset.
    pub misses: u64,
    /// Checkpoints evicted to make room, since last reset.
    pub evictions: u64,
    /// Inserts rejected as permanently oversized, since last reset.
    pub rejections: u64,
}

struct Entry {
    checkpoint: Arc<Checkpoint>,
    /// Logical access stamp; larger is more recent. A counter rather than a
    /// timestamp so that recency is a total order even within one tick.
    last_accessed: u64,
}

struct CacheInner {
    entries: BTreeMap<u64, Entry>,
    resident_bytes: u64,
    clock: u64,
    /// Boundaries with an in-flight materialization reservation.
    pending: HashSet<u64>,
    hits: u64,
    misses: u64,
    evictions: u64,
    rejections: u64,
}

/// An ordered, memory-bounded store of checkpoints.
///
/// Keyed by sequence number with O(log n) nearest-at-or-before lookup.
/// Eviction is strict least-recently-used, ties broken by smallest
/// sequence number first so that later checkpoints (likely to serve
/// forward scrubbing) survive longer.
///
/// All mutations go through a single lock; a lookup never observes a
/// half-evicted or half-inserted checkpoint. Payloads are shared out as
/// `Arc<Checkpoint>` and are never mutated by the cache.
///
/// # Invariant
///
/// After any mutation completes, the sum of `uncompressed_len` over all
/// resident checkpoints is at most the memory threshold.
pub struct CheckpointCache {
    inner: Mutex<CacheInner>,
    memory_threshold_bytes: u64,
}

impl CheckpointCache {
    /// Creates a cache with the given memory threshold in accounted bytes.
    #[must_use]
    pub fn new(memory_threshold_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: BTreeMap::new(),
                resident_bytes: 0,
                clock: 0,
                pending: HashSet::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                rejections: 0,
            }),
            memory_threshold_bytes,
        }
    }

    /// Returns the nearest checkpoint at or before `seq`, if any.
    ///
    /// This is a pure floor lookup: it does not touch recency or hit/miss
    /// counters, because the caller has not yet confirmed the checkpoint is
    /// usable (its blob may still fail to decode). Callers settle the
    /// outcome with [`record_hit`](Self::record_hit) or
    /// [`record_miss`](Self::record_miss).
    #[must_use]
    pub fn lookup_nearest_at_or_before(&self, seq: SequenceNumber) -> Option<Arc<Checkpoint>> {
        let inner = self.inner.lock();
        inner
            .entries
            .range(..=seq.as_u64())
            .next_back()
            .map(|(_, entry)| Arc::clone(&entry.checkpoint))
    }

    /// Updates LRU recency for the checkpoint at `seq`.
    pub fn touch(&self, seq: SequenceNumber) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let stamp = inner.clock;
        if let Some(entry) = inner.entries.get_mut(&seq.as_u64()) {
            entry.last_accessed = stamp;
        }
    }

    /// Records a confirmed cache hit at `seq`, updating recency.
    pub fn record_hit(&self, seq: SequenceNumber) {
        let mut inner = self.inner.lock();
        inner.hits += 1;
        inner.clock += 1;
        let stamp = inner.clock;
        if let Some(entry) = inner.entries.get_mut(&seq.as_u64()) {
            entry.last_accessed = stamp;
        }
    }

    /// Records a cache miss.
    pub fn record_miss(&self) {
        self.inner.lock().misses += 1;
    }

    /// Offers a checkpoint to the cache, evicting LRU entries to make room.
    ///
    /// Returns the outcome plus any checkpoints evicted on the way in. A
    /// checkpoint larger than the whole threshold is rejected without
    /// evicting anything. Releases the materialization reservation for the
    /// boundary either way.
    pub fn insert(&self, checkpoint: Arc<Checkpoint>) -> (InsertOutcome, Vec<Evicted>) {
        let seq = checkpoint.sequence().as_u64();
        let size = checkpoint.uncompressed_len();
        let mut inner = self.inner.lock();
        inner.pending.remove(&seq);

        if inner.entries.contains_key(&seq) {
            return (InsertOutcome::AlreadyPresent, Vec::new());
        }

        if size > self.memory_threshold_bytes {
            inner.rejections += 1;
            debug!(sequence = seq, bytes = size, "checkpoint too large to cache");
            return (InsertOutcome::TooLarge, Vec::new());
        }

        let mut evicted = Vec::new();
        while inner.resident_bytes + size > self.memory_threshold_bytes {
            match Self::evict_lru(&mut inner) {
                Some(e) => evicted.push(e),
                None => break,
            }
        }

        inner.resident_bytes += size;
        inner.clock += 1;
        let stamp = inner.clock;
        inner.entries.insert(
            seq,
            Entry {
                checkpoint,
                last_accessed: stamp,
            },
        );
        (InsertOutcome::Inserted, evicted)
    }

    /// Removes the checkpoint at `seq`, if resident.
    ///
    /// Used when a cached blob turns out to be corrupt.
    pub fn remove(&self, seq: SequenceNumber) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.remove(&seq.as_u64()) {
            Some(entry) => {
                inner.resident_bytes -= entry.checkpoint.uncompressed_len();
                true
            }
            None => false,
        }
    }

    /// Reserves the materialization of the boundary at `seq`.
    ///
    /// Returns true if the caller now owns the materialization. Returns
    /// false if the boundary is already resident or another seek is
    /// already building it; the caller should skip encoding.
    pub fn begin_materialize(&self, seq: SequenceNumber) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&seq.as_u64()) {
            return false;
        }
        inner.pending.insert(seq.as_u64())
    }

    /// Releases a materialization reservation without inserting.
    ///
    /// Called when snapshot encoding fails; the boundary becomes claimable
    /// again.
    pub fn abort_materialize(&self, seq: SequenceNumber) {
        self.inner.lock().pending.remove(&seq.as_u64());
    }

    /// Removes all resident checkpoints and releases every materialization
    /// reservation, so an abandoned reservation cannot outlive the reset.
    pub fn evict_all(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.resident_bytes = 0;
        inner.pending.clear();
    }

    /// Returns statistics since the last reset.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            resident: inner.entries.len(),
            resident_bytes: inner.resident_bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            rejections: inner.rejections,
        }
    }

    /// Resets the hit/miss/eviction/rejection counters.
    pub fn reset_stats(&self) {
        let mut inner = self.inner.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        inner.rejections = 0;
    }

    /// Evicts the least-recently-used entry, ties broken by smallest
    /// sequence first.
    fn evict_lru(inner: &mut CacheInner) -> Option<Evicted> {
        let victim = inner
            .entries
            .iter()
            .min_by_key(|(seq, entry)| (entry.last_accessed, **seq))
            .map(|(seq, _)| *seq)?;
        let entry = inner.entries.remove(&victim)?;
        inner.resident_bytes -= entry.checkpoint.uncompressed_len();
        inner.evictions += 1;
        debug!(sequence = victim, "evicted checkpoint");
        Some(Evicted {
            sequence: entry.checkpoint.sequence(),
            resident_age: entry.checkpoint.created_at().elapsed(),
            uncompressed_len: entry.checkpoint.uncompressed_len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn checkpoint(seq: u64, size: u64) -> Arc<Checkpoint> {
        Arc::new(Checkpoint::new(
            SequenceNumber::new(seq),
            Bytes::from_static(b"blob"),
            size,
        ))
    }

    #[test]
    fn empty_cache_lookup_is_none() {
        let cache = CheckpointCache::new(1000);
        assert!(cache
            .lookup_nearest_at_or_before(SequenceNumber::new(500))
            .is_none());
    }

    #[test]
    fn floor_lookup_finds_nearest_at_or_before() {
        let cache = CheckpointCache::new(10_000);
        cache.insert(checkpoint(1000, 10));
        cache.insert(checkpoint(2000, 10));
        cache.insert(checkpoint(3000, 10));

        let cp = cache
            .lookup_nearest_at_or_before(SequenceNumber::new(2500))
            .unwrap();
        assert_eq!(cp.sequence().as_u64(), 2000);

        let cp = cache
            .lookup_nearest_at_or_before(SequenceNumber::new(3000))
            .unwrap();
        assert_eq!(cp.sequence().as_u64(), 3000);

        assert!(cache
            .lookup_nearest_at_or_before(SequenceNumber::new(999))
            .is_none());
    }

    #[test]
    fn insert_is_bounded() {
        let cache = CheckpointCache::new(100);
        for i in 1..=20 {
            cache.insert(checkpoint(i * 1000, 10));
            assert!(cache.stats().resident_bytes <= 100);
        }
        assert_eq!(cache.stats().resident, 10);
    }

    #[test]
    fn lru_eviction_order() {
        // Capacity for exactly two checkpoints.
        let cache = CheckpointCache::new(20);
        cache.insert(checkpoint(1000, 10));
        cache.insert(checkpoint(2000, 10));

        // Touch 1000 so 2000 becomes the LRU victim.
        cache.record_hit(SequenceNumber::new(1000));

        let (outcome, evicted) = cache.insert(checkpoint(3000, 10));
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].sequence.as_u64(), 2000);

        assert!(cache
            .lookup_nearest_at_or_before(SequenceNumber::new(2999))
            .map(|cp| cp.sequence().as_u64() == 1000)
            .unwrap_or(false));
    }

    #[test]
    fn untouched_entries_evict_oldest_first() {
        let cache = CheckpointCache::new(30);
        // Inserted in order, never touched: insertion stamps already order
        // them, so evict the oldest stamp which is also the smallest seq.
        cache.insert(checkpoint(1000, 10));
        cache.insert(checkpoint(2000, 10));
        cache.insert(checkpoint(3000, 10));

        let (_, evicted) = cache.insert(checkpoint(4000, 10));
        assert_eq!(evicted[0].sequence.as_u64(), 1000);
    }

    #[test]
    fn oversized_checkpoint_is_rejected_without_evicting() {
        let cache = CheckpointCache::new(100);
        cache.insert(checkpoint(1000, 50));

        let (outcome, evicted) = cache.insert(checkpoint(2000, 200));
        assert_eq!(outcome, InsertOutcome::TooLarge);
        assert!(evicted.is_empty());
        assert_eq!(cache.stats().resident, 1);
        assert_eq!(cache.stats().rejections, 1);
    }

    #[test]
    fn duplicate_insert_is_discarded() {
        let cache = CheckpointCache::new(1000);
        cache.insert(checkpoint(1000, 10));
        let (outcome, _) = cache.insert(checkpoint(1000, 10));
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);
        assert_eq!(cache.stats().resident_bytes, 10);
    }

    #[test]
    fn remove_releases_bytes() {
        let cache = CheckpointCache::new(1000);
        cache.insert(checkpoint(1000, 40));
        assert!(cache.remove(SequenceNumber::new(1000)));
        assert!(!cache.remove(SequenceNumber::new(1000)));
        assert_eq!(cache.stats().resident_bytes, 0);
    }

    #[test]
    fn evict_all_clears() {
        let cache = CheckpointCache::new(1000);
        cache.insert(checkpoint(1000, 10));
        cache.insert(checkpoint(2000, 10));
        cache.evict_all();
        let stats = cache.stats();
        assert_eq!(stats.resident, 0);
        assert_eq!(stats.resident_bytes, 0);
    }

    #[test]
    fn evict_all_releases_reservations() {
        // A reservation abandoned without insert or abort must not block
        // the boundary after an administrative reset.
        let cache = CheckpointCache::new(1000);
        assert!(cache.begin_materialize(SequenceNumber::new(1000)));
        cache.evict_all();
        assert!(cache.begin_materialize(SequenceNumber::new(1000)));
    }

    #[test]
    fn materialize_reservation_is_exclusive() {
        let cache = CheckpointCache::new(1000);
        assert!(cache.begin_materialize(SequenceNumber::new(1000)));
        assert!(!cache.begin_materialize(SequenceNumber::new(1000)));

        // Insert releases the reservation; boundary now resident.
        cache.insert(checkpoint(1000, 10));
        assert!(!cache.begin_materialize(SequenceNumber::new(1000)));

        // A distinct boundary is independent.
        assert!(cache.begin_materialize(SequenceNumber::new(2000)));
        cache.abort_materialize(SequenceNumber::new(2000));
        assert!(cache.begin_materialize(SequenceNumber::new(2000)));
    }

    #[test]
    fn hit_miss_counters() {
        let cache = CheckpointCache::new(1000);
        cache.insert(checkpoint(1000, 10));
        cache.record_hit(SequenceNumber::new(1000));
        cache.record_hit(SequenceNumber::new(1000));
        cache.record_miss();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);

        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.resident, 1);
    }

    #[test]
    fn concurrent_insert_and_lookup() {
        use std::thread;

        let cache = Arc::new(CheckpointCache::new(500));
        let mut handles = vec![];

        for t in 0..4u64 {
            let c = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let seq = (t * 50 + i + 1) * 100;
                    c.insert(checkpoint(seq, 10));
                    if let Some(cp) = c.lookup_nearest_at_or_before(SequenceNumber::new(seq)) {
                        assert!(cp.sequence().as_u64() <= seq);
                    }
                    assert!(c.stats().resident_bytes <= 500);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.stats().resident_bytes <= 500);
    }

    proptest::proptest! {
        #[test]
        fn boundedness_under_arbitrary_inserts(
            sizes in proptest::collection::vec(1u64..120, 1..60),
        ) {
            let cache = CheckpointCache::new(256);
            for (i, size) in sizes.iter().enumerate() {
                cache.insert(checkpoint((i as u64 + 1) * 10, *size));
                proptest::prop_assert!(cache.stats().resident_bytes <= 256);
            }
        }
    }
}
