//! Seek orchestration: checkpoint lookup, delta replay, write-through.

use crate::cache::{CheckpointCache, InsertOutcome};
use crate::checkpoint::Checkpoint;
use crate::config::ReplayConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::reducer::Reducer;
use crate::telemetry::TelemetrySink;
use rewind_codec::{decode_snapshot, encode_snapshot, Compressor, ZstdCompressor};
use rewind_log::{EventLog, SequenceNumber};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The result of reconstructing state at a target sequence.
///
/// Produced fresh per call; the engine never mutates a previously returned
/// state.
#[derive(Debug, Clone)]
pub struct SeekResult<S> {
    /// The reconstructed state.
    pub state: S,
    /// The sequence actually reached (the target after clamping).
    pub sequence_reached: SequenceNumber,
    /// Wall-clock time the seek took.
    pub latency: Duration,
    /// Whether a cached checkpoint accelerated this seek.
    pub checkpoint_hit: bool,
    /// Number of events folded through the reducer.
    pub events_replayed: u64,
}

/// Reconstructs application state at arbitrary sequence numbers.
///
/// A seek resolves the nearest cached checkpoint at or before the target,
/// folds the remaining event delta through the reducer, and materializes
/// any checkpoint boundaries the fold crosses (write-through, so future
/// nearby seeks stay cheap regardless of where the caller stops).
///
/// The engine is read-only with respect to the log and supports many
/// concurrent seeks; the cache serializes its own mutations internally.
pub struct ReplayEngine<R: Reducer> {
    log: Arc<dyn EventLog>,
    reducer: R,
    cache: CheckpointCache,
    compressor: Box<dyn Compressor>,
    telemetry: Arc<TelemetrySink>,
    config: ReplayConfig,
}

impl<R: Reducer> ReplayEngine<R> {
    /// Creates an engine with the default zstd compressor and a fresh
    /// telemetry sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn new(log: Arc<dyn EventLog>, reducer: R, config: ReplayConfig) -> ReplayResult<Self> {
        Self::with_parts(
            log,
            reducer,
            config,
            Box::new(ZstdCompressor::default()),
            Arc::new(TelemetrySink::new()),
        )
    }

    /// Creates an engine with an explicit compressor and telemetry sink.
    ///
    /// # Errors
    ///
    /// Returns an error if `checkpoint_interval_events` or
    /// `events_per_tick` is zero.
    pub fn with_parts(
        log: Arc<dyn EventLog>,
        reducer: R,
        config: ReplayConfig,
        compressor: Box<dyn Compressor>,
        telemetry: Arc<TelemetrySink>,
    ) -> ReplayResult<Self> {
        if config.checkpoint_interval_events == 0 {
            return Err(ReplayError::invalid_config(
                "checkpoint_interval_events must be greater than zero",
            ));
        }
        if config.events_per_tick == 0 {
            return Err(ReplayError::invalid_config(
                "events_per_tick must be greater than zero",
            ));
        }
        Ok(Self {
            cache: CheckpointCache::new(config.memory_threshold_bytes),
            log,
            reducer,
            compressor,
            telemetry,
            config,
        })
    }

    /// Reconstructs state at `target`.
    ///
    /// Targets past the log head are clamped rather than rejected:
    /// scrubbers routinely overshoot during drag. A corrupt cached
    /// checkpoint is treated as a miss, evicted, and recomputed from an
    /// older checkpoint or the origin; it never surfaces here.
    ///
    /// # Errors
    ///
    /// Returns an error only for integrity failures: a gap in the event
    /// log, or a reducer that rejects an event.
    pub fn seek(&self, target: SequenceNumber) -> ReplayResult<SeekResult<R::State>> {
        self.seek_inner(target, false)
    }

    /// Bulk entry point for document-load recovery.
    ///
    /// Behaves identically to [`seek`](Self::seek) but is expected to be
    /// called once per load, is counted separately in telemetry, and is
    /// exempt from the interactive latency target.
    ///
    /// # Errors
    ///
    /// Same conditions as [`seek`](Self::seek).
    pub fn replay_from_snapshot(
        &self,
        max_sequence: SequenceNumber,
    ) -> ReplayResult<SeekResult<R::State>> {
        self.seek_inner(max_sequence, true)
    }

    /// Current head of the event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot report its head.
    pub fn head_sequence(&self) -> ReplayResult<SequenceNumber> {
        Ok(self.log.head_sequence()?)
    }

    /// The checkpoint cache, for administrative inspection.
    #[must_use]
    pub fn cache(&self) -> &CheckpointCache {
        &self.cache
    }

    /// The telemetry sink this engine reports into.
    #[must_use]
    pub fn telemetry(&self) -> &Arc<TelemetrySink> {
        &self.telemetry
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    fn seek_inner(&self, target: SequenceNumber, bulk: bool) -> ReplayResult<SeekResult<R::State>> {
        let start = Instant::now();

        let head = self.log.head_sequence()?;
        let target = target.min(head);

        let (base_state, base_seq) = self.resolve_base(target);
        let checkpoint_hit = !base_seq.is_origin() || target.is_origin();
        if checkpoint_hit && !base_seq.is_origin() {
            self.cache.record_hit(base_seq);
        } else {
            self.cache.record_miss();
        }

        let events = self.log.events_in_range(base_seq, target)?;
        let state = self.fold(base_state, base_seq, target, &events)?;

        let events_replayed = target.as_u64() - base_seq.as_u64();
        let latency = start.elapsed();

        if bulk {
            self.telemetry.record_bulk_replay(latency, events_replayed);
        } else {
            self.telemetry
                .record_seek(latency, checkpoint_hit, events_replayed);
            if latency > self.config.latency_target {
                self.telemetry.record_latency_breach();
                warn!(
                    target_sequence = target.as_u64(),
                    latency_ms = latency.as_millis() as u64,
                    target_ms = self.config.latency_target.as_millis() as u64,
                    "seek exceeded latency target"
                );
            }
        }

        debug!(
            target_sequence = target.as_u64(),
            base_sequence = base_seq.as_u64(),
            events_replayed,
            checkpoint_hit,
            "seek complete"
        );

        Ok(SeekResult {
            state,
            sequence_reached: target,
            latency,
            checkpoint_hit,
            events_replayed,
        })
    }

    /// Finds the newest decodable checkpoint at or before `target`.
    ///
    /// Corrupt entries are evicted and the search falls back to the next
    /// older checkpoint, bottoming out at the origin state.
    fn resolve_base(&self, target: SequenceNumber) -> (R::State, SequenceNumber) {
        let mut upper = target;
        loop {
            let Some(checkpoint) = self.cache.lookup_nearest_at_or_before(upper) else {
                return (self.reducer.initial_state(), SequenceNumber::ORIGIN);
            };
            let seq = checkpoint.sequence();
            match decode_snapshot::<R::State>(
                seq.as_u64(),
                checkpoint.blob(),
                self.compressor.as_ref(),
            ) {
                Ok(state) => return (state, seq),
                Err(err) => {
                    // Treated exactly as a cache miss: drop the corrupt
                    // entry and keep searching below it.
                    warn!(
                        sequence = seq.as_u64(),
                        error = %err,
                        "cached checkpoint failed to decode, recomputing"
                    );
                    self.telemetry.record_decode_failure();
                    self.cache.remove(seq);
                    if seq.is_origin() {
                        return (self.reducer.initial_state(), SequenceNumber::ORIGIN);
                    }
                    upper = SequenceNumber::new(seq.as_u64() - 1);
                }
            }
        }
    }

    /// Folds `events` onto `state`, materializing every interval boundary
    /// strictly between `base` and `target` as it is crossed.
    fn fold(
        &self,
        mut state: R::State,
        base: SequenceNumber,
        target: SequenceNumber,
        events: &[rewind_log::Event],
    ) -> ReplayResult<R::State> {
        let interval = self.config.checkpoint_interval_events;
        // First multiple of the interval strictly after base.
        let mut next_boundary = (base.as_u64() / interval + 1) * interval;

        for event in events {
            state = self
                .reducer
                .apply(state, event)
                .map_err(|e| ReplayError::reducer(event.sequence, e.message))?;

            if event.sequence.as_u64() == next_boundary {
                if next_boundary < target.as_u64() {
                    self.materialize(SequenceNumber::new(next_boundary), &state);
                }
                next_boundary += interval;
            }
        }

        Ok(state)
    }

    /// Write-through checkpoint creation at an exact boundary.
    ///
    /// Failures here never fail the seek: an unencodable state is logged
    /// and the boundary reservation released so a later seek can retry.
    fn materialize(&self, boundary: SequenceNumber, state: &R::State) {
        if !self.cache.begin_materialize(boundary) {
            // Resident already, or another seek owns this boundary.
            return;
        }

        match encode_snapshot(boundary.as_u64(), state, self.compressor.as_ref()) {
            Ok(blob) => {
                let compressed_len = blob.bytes.len() as u64;
                let checkpoint = Arc::new(Checkpoint::new(
                    boundary,
                    blob.bytes,
                    blob.uncompressed_len,
                ));
                let (outcome, evicted) = self.cache.insert(checkpoint);
                if outcome == InsertOutcome::Inserted {
                    self.telemetry
                        .record_checkpoint_created(blob.uncompressed_len, compressed_len);
                    debug!(
                        sequence = boundary.as_u64(),
                        uncompressed = blob.uncompressed_len,
                        compressed = compressed_len,
                        "materialized checkpoint"
                    );
                }
                for e in evicted {
                    self.telemetry.record_eviction(e.sequence, e.resident_age);
                }
            }
            Err(err) => {
                warn!(
                    sequence = boundary.as_u64(),
                    error = %err,
                    "failed to encode checkpoint, leaving boundary uncached"
                );
                self.cache.abort_materialize(boundary);
            }
        }
    }
}
