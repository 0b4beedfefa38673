//! # Rewind Core
//!
//! Checkpoint-accelerated replay engine for an event-sourced document model.
//!
//! This crate provides:
//! - A memory-bounded, LRU-evicted cache of compressed state checkpoints
//! - A replay engine that reconstructs state at any sequence number by
//!   folding a bounded event delta on top of the nearest checkpoint
//! - A playback driver that turns the engine into a timed state stream
//! - A telemetry sink recording latency, hit/miss, and eviction metrics
//!
//! ## Seeking
//!
//! ```rust,ignore
//! use rewind_core::{ReplayConfig, ReplayEngine};
//!
//! let engine = ReplayEngine::new(log, reducer, ReplayConfig::default())?;
//! let result = engine.seek(1500.into())?;
//! println!("reconstructed {} in {:?}", result.sequence_reached, result.latency);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod checkpoint;
mod config;
mod engine;
mod error;
mod playback;
mod reducer;
mod telemetry;

pub use cache::{CacheStats, CheckpointCache, Evicted, InsertOutcome};
pub use checkpoint::Checkpoint;
pub use config::ReplayConfig;
pub use engine::{ReplayEngine, SeekResult};
pub use error::{ReplayError, ReplayResult};
pub use playback::{
    Direction, PlaybackDriver, PlaybackSession, PlaybackState, Speed, StateFeed, StateUpdate,
};
pub use reducer::{Reducer, ReducerError};
pub use telemetry::{EvictionRecord, MetricsSnapshot, TelemetrySink};
