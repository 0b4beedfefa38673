//! Seek telemetry: counters, latency histogram, eviction records.

use parking_lot::Mutex;
use rewind_log::SequenceNumber;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bounds of the latency histogram buckets, in microseconds.
///
/// The final implicit bucket is unbounded.
const BUCKET_BOUNDS_US: [u64; 10] = [
    1_000, 2_000, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000,
];

/// Maximum eviction records retained for inspection.
const MAX_EVICTION_RECORDS: usize = 1024;

/// A recorded cache eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionRecord {
    /// Boundary of the evicted checkpoint.
    pub sequence: SequenceNumber,
    /// How long the checkpoint was resident before eviction.
    pub resident_age: Duration,
}

/// Accumulates replay metrics.
///
/// All counters are atomic and can be read while seeks are in progress.
/// Recording is best-effort and synchronous; it never blocks or fails a
/// seek and has no effect on the replay result. The sink is injected into
/// the engine by `Arc`, never reached through globals, so the engine stays
/// testable in isolation.
#[derive(Debug, Default)]
pub struct TelemetrySink {
    seeks: AtomicU64,
    bulk_replays: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    events_replayed: AtomicU64,
    checkpoints_created: AtomicU64,
    snapshot_bytes_uncompressed: AtomicU64,
    snapshot_bytes_compressed: AtomicU64,
    evictions: AtomicU64,
    decode_failures: AtomicU64,
    latency_breaches: AtomicU64,
    latency_buckets: [AtomicU64; BUCKET_BOUNDS_US.len() + 1],
    eviction_log: Mutex<Vec<EvictionRecord>>,
}

impl TelemetrySink {
    /// Creates a new sink with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed seek.
    pub fn record_seek(&self, latency: Duration, checkpoint_hit: bool, events_replayed: u64) {
        self.seeks.fetch_add(1, Ordering::Relaxed);
        if checkpoint_hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.events_replayed
            .fetch_add(events_replayed, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Records a bulk (document-load) replay.
    ///
    /// Bulk replays are counted separately and are exempt from the
    /// interactive latency target, but still land in the histogram.
    pub fn record_bulk_replay(&self, latency: Duration, events_replayed: u64) {
        self.bulk_replays.fetch_add(1, Ordering::Relaxed);
        self.events_replayed
            .fetch_add(events_replayed, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Records a seek that exceeded the interactive latency target.
    pub fn record_latency_breach(&self) {
        self.latency_breaches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a newly materialized checkpoint and its snapshot sizes.
    pub fn record_checkpoint_created(&self, uncompressed_len: u64, compressed_len: u64) {
        self.checkpoints_created.fetch_add(1, Ordering::Relaxed);
        self.snapshot_bytes_uncompressed
            .fetch_add(uncompressed_len, Ordering::Relaxed);
        self.snapshot_bytes_compressed
            .fetch_add(compressed_len, Ordering::Relaxed);
    }

    /// Records a cache eviction.
    pub fn record_eviction(&self, sequence: SequenceNumber, resident_age: Duration) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        let mut log = self.eviction_log.lock();
        if log.len() >= MAX_EVICTION_RECORDS {
            log.remove(0);
        }
        log.push(EvictionRecord {
            sequence,
            resident_age,
        });
    }

    /// Records a cached checkpoint that failed to decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency: Duration) {
        let us = latency.as_micros().min(u128::from(u64::MAX)) as u64;
        let bucket = BUCKET_BOUNDS_US
            .iter()
            .position(|&bound| us <= bound)
            .unwrap_or(BUCKET_BOUNDS_US.len());
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the recent eviction records, oldest first.
    #[must_use]
    pub fn eviction_records(&self) -> Vec<EvictionRecord> {
        self.eviction_log.lock().clone()
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let buckets: Vec<u64> = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        MetricsSnapshot {
            seeks: self.seeks.load(Ordering::Relaxed),
            bulk_replays: self.bulk_replays.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            events_replayed: self.events_replayed.load(Ordering::Relaxed),
            checkpoints_created: self.checkpoints_created.load(Ordering::Relaxed),
            snapshot_bytes_uncompressed: self.snapshot_bytes_uncompressed.load(Ordering::Relaxed),
            snapshot_bytes_compressed: self.snapshot_bytes_compressed.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            latency_breaches: self.latency_breaches.load(Ordering::Relaxed),
            latency_p50: percentile(&buckets, 0.50),
            latency_p95: percentile(&buckets, 0.95),
            latency_p99: percentile(&buckets, 0.99),
        }
    }
}

/// A point-in-time snapshot of replay metrics.
///
/// Unlike [`TelemetrySink`], this is a plain struct that can be compared
/// or passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Interactive seeks issued.
    pub seeks: u64,
    /// Bulk (document-load) replays issued.
    pub bulk_replays: u64,
    /// Seeks served from a cached checkpoint.
    pub hits: u64,
    /// Seeks that replayed from the origin.
    pub misses: u64,
    /// Total events folded through the reducer.
    pub events_replayed: u64,
    /// Checkpoints materialized by write-through.
    pub checkpoints_created: u64,
    /// Total serialized state bytes before compression.
    pub snapshot_bytes_uncompressed: u64,
    /// Total snapshot blob bytes after compression and framing.
    pub snapshot_bytes_compressed: u64,
    /// Checkpoints evicted from the cache.
    pub evictions: u64,
    /// Cached checkpoints that failed to decode and were recomputed.
    pub decode_failures: u64,
    /// Seeks that exceeded the interactive latency target.
    pub latency_breaches: u64,
    /// Approximate 50th-percentile seek latency.
    pub latency_p50: Duration,
    /// Approximate 95th-percentile seek latency.
    pub latency_p95: Duration,
    /// Approximate 99th-percentile seek latency.
    pub latency_p99: Duration,
}

/// Approximates a percentile from the histogram as the upper bound of the
/// bucket containing it.
fn percentile(buckets: &[u64], p: f64) -> Duration {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return Duration::ZERO;
    }
    let rank = ((total as f64) * p).ceil() as u64;
    let mut seen = 0u64;
    for (i, count) in buckets.iter().enumerate() {
        seen += count;
        if seen >= rank {
            let bound_us = BUCKET_BOUNDS_US
                .get(i)
                .copied()
                .unwrap_or(BUCKET_BOUNDS_US[BUCKET_BOUNDS_US.len() - 1] * 2);
            return Duration::from_micros(bound_us);
        }
    }
    Duration::from_micros(BUCKET_BOUNDS_US[BUCKET_BOUNDS_US.len() - 1] * 2)
}
