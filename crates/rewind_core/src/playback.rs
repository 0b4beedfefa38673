//! Timed playback: transport controls, tick loop, and the state stream.

use crate::engine::{ReplayEngine, SeekResult};
use crate::error::ReplayResult;
use crate::reducer::Reducer;
use parking_lot::{Mutex, RwLock};
use rewind_log::SequenceNumber;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

/// Playback rate multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    /// Half speed.
    Half,
    /// Real-time.
    Normal,
    /// Double speed.
    Double,
    /// Five times real-time.
    FiveX,
    /// Ten times real-time.
    TenX,
}

impl Speed {
    /// The rate multiplier applied to events-per-tick.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::Normal => 1.0,
            Self::Double => 2.0,
            Self::FiveX => 5.0,
            Self::TenX => 10.0,
        }
    }
}

/// Playback direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the log head.
    Forward,
    /// Toward the origin.
    Backward,
}

impl Direction {
    /// -1 for backward, +1 for forward.
    #[must_use]
    pub fn signum(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

/// Transport state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No playback in progress.
    Stopped,
    /// Ticks are advancing the playhead.
    Playing,
    /// Playback suspended; the playhead holds its position.
    Paused,
}

/// A playback session's transport state.
///
/// Created on playback start, mutated by transport controls, destroyed on
/// explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSession {
    /// Current playhead position.
    pub current_sequence: SequenceNumber,
    /// Playback rate.
    pub speed: Speed,
    /// Playback direction.
    pub direction: Direction,
    /// Transport state.
    pub state: PlaybackState,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_sequence: SequenceNumber::ORIGIN,
            speed: Speed::Normal,
            direction: Direction::Forward,
            state: PlaybackState::Stopped,
        }
    }
}

/// One reconstructed state published to observers.
#[derive(Debug, Clone)]
pub struct StateUpdate<S> {
    /// The reconstructed state.
    pub state: S,
    /// The sequence the seek reached.
    pub sequence_reached: SequenceNumber,
    /// Whether the seek was checkpoint-accelerated.
    pub checkpoint_hit: bool,
    /// Seek latency.
    pub latency: Duration,
}

/// Distributes state updates to subscribers.
///
/// Updates are emitted after each completed seek, in completion order for
/// a single driver. Disconnected subscribers are dropped on the next emit.
pub struct StateFeed<S> {
    subscribers: RwLock<Vec<Sender<StateUpdate<S>>>>,
    latest: Mutex<Option<StateUpdate<S>>>,
}

impl<S: Clone> StateFeed<S> {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            latest: Mutex::new(None),
        }
    }

    /// Subscribes to future state updates.
    ///
    /// The receiver should be polled regularly; the channel is unbounded.
    pub fn subscribe(&self) -> Receiver<StateUpdate<S>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an update to all subscribers, pruning disconnected ones.
    pub fn emit(&self, update: StateUpdate<S>) {
        *self.latest.lock() = Some(update.clone());
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Returns the most recent update, for catch-up on subscribe.
    #[must_use]
    pub fn latest(&self) -> Option<StateUpdate<S>> {
        self.latest.lock().clone()
    }

    /// Returns the number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<S: Clone> Default for StateFeed<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives timed playback against a replay engine.
///
/// A cooperative scheduler, not a second execution context sharing mutable
/// state with the engine: a dedicated thread wakes every tick, computes
/// the next target from the session's speed and direction, and issues an
/// ordinary `seek`. Cancellation is a flag check at tick boundaries; a
/// seek already folding runs to completion.
pub struct PlaybackDriver<R: Reducer + 'static> {
    engine: Arc<ReplayEngine<R>>,
    session: Arc<Mutex<PlaybackSession>>,
    feed: Arc<StateFeed<R::State>>,
    cancel: Arc<AtomicBool>,
    tick_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Reducer + 'static> PlaybackDriver<R> {
    /// Creates a driver over the given engine. Playback starts stopped, at
    /// the origin.
    #[must_use]
    pub fn new(engine: Arc<ReplayEngine<R>>) -> Self {
        Self {
            engine,
            session: Arc::new(Mutex::new(PlaybackSession::default())),
            feed: Arc::new(StateFeed::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            tick_thread: Mutex::new(None),
        }
    }

    /// Subscribes to the reconstructed state stream.
    pub fn subscribe(&self) -> Receiver<StateUpdate<R::State>> {
        self.feed.subscribe()
    }

    /// The state feed, for catch-up reads.
    #[must_use]
    pub fn feed(&self) -> &Arc<StateFeed<R::State>> {
        &self.feed
    }

    /// Returns a snapshot of the session's transport state.
    #[must_use]
    pub fn session(&self) -> PlaybackSession {
        *self.session.lock()
    }

    /// Starts or resumes playback at the given speed.
    pub fn play(&self, speed: Speed, direction: Direction) {
        {
            let mut session = self.session.lock();
            session.speed = speed;
            session.direction = direction;
            session.state = PlaybackState::Playing;
        }
        self.ensure_tick_thread();
        debug!(?speed, ?direction, "playback started");
    }

    /// Pauses playback; the playhead holds its position.
    pub fn pause(&self) {
        let mut session = self.session.lock();
        if session.state == PlaybackState::Playing {
            session.state = PlaybackState::Paused;
        }
    }

    /// Resumes a paused session.
    pub fn resume(&self) {
        {
            let mut session = self.session.lock();
            if session.state != PlaybackState::Paused {
                return;
            }
            session.state = PlaybackState::Playing;
        }
        self.ensure_tick_thread();
    }

    /// Issues exactly one discrete seek of one event and lands in Paused.
    ///
    /// # Errors
    ///
    /// Propagates integrity failures from the underlying seek.
    pub fn step(&self, direction: Direction) -> ReplayResult<SeekResult<R::State>> {
        let target = {
            let mut session = self.session.lock();
            session.state = PlaybackState::Paused;
            session.direction = direction;
            let current = session.current_sequence.as_u64();
            match direction {
                Direction::Forward => SequenceNumber::new(current + 1),
                Direction::Backward => SequenceNumber::new(current.saturating_sub(1)),
            }
        };
        let result = self.engine.seek(target)?;
        self.session.lock().current_sequence = result.sequence_reached;
        self.publish(&result);
        Ok(result)
    }

    /// Scrubs directly to `target` without changing the transport state.
    ///
    /// # Errors
    ///
    /// Propagates integrity failures from the underlying seek.
    pub fn seek_to(&self, target: SequenceNumber) -> ReplayResult<SeekResult<R::State>> {
        let result = self.engine.seek(target)?;
        self.session.lock().current_sequence = result.sequence_reached;
        self.publish(&result);
        Ok(result)
    }

    /// Stops playback and joins the tick thread.
    pub fn stop(&self) {
        self.session.lock().state = PlaybackState::Stopped;
        self.cancel.store(true, Ordering::SeqCst);
        let handle = self.tick_thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn publish(&self, result: &SeekResult<R::State>) {
        self.feed.emit(StateUpdate {
            state: result.state.clone(),
            sequence_reached: result.sequence_reached,
            checkpoint_hit: result.checkpoint_hit,
            latency: result.latency,
        });
    }

    fn ensure_tick_thread(&self) {
        let mut slot = self.tick_thread.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(handle) = slot.take() {
            let _ = handle.join();
        }

        self.cancel.store(false, Ordering::SeqCst);
        let engine = Arc::clone(&self.engine);
        let session = Arc::clone(&self.session);
        let feed = Arc::clone(&self.feed);
        let cancel = Arc::clone(&self.cancel);
        let tick_interval = engine.config().tick_interval;
        let events_per_tick = engine.config().events_per_tick;

        *slot = Some(std::thread::spawn(move || {
            tick_loop(engine, session, feed, cancel, tick_interval, events_per_tick);
        }));
    }
}

impl<R: Reducer + 'static> Drop for PlaybackDriver<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The playback scheduling loop.
///
/// A canceled pending tick simply skips issuing its seek. The cancel flag
/// is the only exit: a session that stops at a boundary keeps its thread
/// alive and idle, so a `play()` issued in reaction to the final update
/// (the subscriber-driven path) always finds a live ticker.
fn tick_loop<R: Reducer>(
    engine: Arc<ReplayEngine<R>>,
    session: Arc<Mutex<PlaybackSession>>,
    feed: Arc<StateFeed<R::State>>,
    cancel: Arc<AtomicBool>,
    tick_interval: Duration,
    events_per_tick: u64,
) {
    loop {
        std::thread::sleep(tick_interval);
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        let target = {
            let s = session.lock();
            match s.state {
                PlaybackState::Stopped | PlaybackState::Paused => continue,
                PlaybackState::Playing => {
                    let step = ((events_per_tick as f64) * s.speed.multiplier()).round() as i64
                        * s.direction.signum();
                    let next = s.current_sequence.as_u64() as i64 + step;
                    SequenceNumber::new(next.max(0) as u64)
                }
            }
        };

        let result = match engine.seek(target) {
            Ok(result) => result,
            Err(err) => {
                // Integrity failure: surface through the log and stop
                // rather than replaying the same broken range every tick.
                error!(error = %err, "playback seek failed, stopping");
                session.lock().state = PlaybackState::Stopped;
                continue;
            }
        };

        let reached = result.sequence_reached;
        feed.emit(StateUpdate {
            state: result.state.clone(),
            sequence_reached: reached,
            checkpoint_hit: result.checkpoint_hit,
            latency: result.latency,
        });

        let mut s = session.lock();
        s.current_sequence = reached;
        if s.state == PlaybackState::Playing {
            let head = engine.head_sequence().unwrap_or(reached);
            let at_boundary = match s.direction {
                Direction::Forward => reached >= head,
                Direction::Backward => reached.is_origin(),
            };
            if at_boundary {
                s.state = PlaybackState::Stopped;
                debug!(sequence = reached.as_u64(), "playback reached boundary");
            }
        }
    }
}
