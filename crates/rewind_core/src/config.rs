//! Replay engine configuration.

use std::time::Duration;

/// Configuration for the replay engine and playback driver.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Checkpoint interval in events. Checkpoints land on multiples of this.
    pub checkpoint_interval_events: u64,

    /// Memory budget for resident checkpoints, accounted in uncompressed
    /// state bytes.
    pub memory_threshold_bytes: u64,

    /// Wall-clock interval between playback ticks.
    pub tick_interval: Duration,

    /// Events advanced per tick at 1x speed.
    pub events_per_tick: u64,

    /// Interactive seek latency target. Telemetry and alerting only; a
    /// breach never fails a seek.
    pub latency_target: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_events: 1000,
            memory_threshold_bytes: 100 * 1024 * 1024, // 100 MiB
            tick_interval: Duration::from_millis(16),  // ~60 updates/second
            events_per_tick: 4,
            latency_target: Duration::from_millis(50),
        }
    }
}

impl ReplayConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the checkpoint interval in events.
    #[must_use]
    pub const fn checkpoint_interval_events(mut self, interval: u64) -> Self {
        self.checkpoint_interval_events = interval;
        self
    }

    /// Sets the memory budget for resident checkpoints.
    #[must_use]
    pub const fn memory_threshold_bytes(mut self, bytes: u64) -> Self {
        self.memory_threshold_bytes = bytes;
        self
    }

    /// Sets the playback tick interval.
    #[must_use]
    pub const fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the number of events advanced per tick at 1x speed.
    #[must_use]
    pub const fn events_per_tick(mut self, events: u64) -> Self {
        self.events_per_tick = events;
        self
    }

    /// Sets the interactive latency target.
    #[must_use]
    pub const fn latency_target(mut self, target: Duration) -> Self {
        self.latency_target = target;
        self
    }
}
