//! Scrubbable playback over a recorded terminal session.
//!
//! The cursor is ephemeral: `position` counts how many events are visible
//! (`0..=len`), `playing` is true while a timer task owns the cursor, and
//! `speed` scales the gaps between event timestamps.
//!
//! Playback timing depends only on the event timestamps and the speed, so the
//! same sequence, speed and seeks always produce the same cursor trajectory.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::eventlog::{session_log_key, EventLogStore};

use super::history::{HistoryEntry, HistorySource};

#[derive(Error, Debug, PartialEq)]
pub enum ReplayError {
    #[error("Playback speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplayCursor {
    pub position: usize,
    pub playing: bool,
    pub speed: f64,
}

impl Default for ReplayCursor {
    fn default() -> Self {
        Self {
            position: 0,
            playing: false,
            speed: 1.0,
        }
    }
}

/// What a consumer should render for the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReplayState {
    Idle,
    Loading,
    Ready { events: usize },
    Empty,
    Error { message: String },
}

struct Inner {
    session_id: Option<String>,
    events: Arc<Vec<HistoryEntry>>,
    generation: u64,
    closed: bool,
    next_playback_id: u64,
    playback: Option<(u64, CancellationToken)>,
}

struct Shared {
    inner: Mutex<Inner>,
    cursor_tx: watch::Sender<ReplayCursor>,
    state_tx: watch::Sender<ReplayState>,
}

impl Shared {
    /// Cancel the running playback (if any) and mark the cursor paused.
    /// Must be called with `inner` locked so no timer step can land afterwards.
    fn stop_locked(&self, inner: &mut Inner) {
        if let Some((_, token)) = inner.playback.take() {
            token.cancel();
        }
        self.cursor_tx.send_if_modified(|cursor| {
            let changed = cursor.playing;
            cursor.playing = false;
            changed
        });
    }

    fn set_state(&self, state: ReplayState) {
        self.state_tx.send_replace(state);
    }
}

/// Cancellation handle returned by [`SessionReplayer::play`].
///
/// `cancel` is synchronous and idempotent: once it returns, the cursor will
/// not advance again for this playback.
#[derive(Clone)]
pub struct PlaybackHandle {
    id: u64,
    token: CancellationToken,
    shared: Weak<Shared>,
}

impl PlaybackHandle {
    pub fn cancel(&self) {
        let Some(shared) = self.shared.upgrade() else {
            self.token.cancel();
            return;
        };
        let mut inner = shared.inner.lock();
        if matches!(inner.playback, Some((id, _)) if id == self.id) {
            shared.stop_locked(&mut inner);
        } else {
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this playback stops, by reaching the end or being cancelled
    pub async fn finished(&self) {
        self.token.cancelled().await
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct SessionReplayer {
    history: Option<Arc<dyn HistorySource>>,
    store: Option<Arc<dyn EventLogStore>>,
    shared: Arc<Shared>,
}

impl SessionReplayer {
    pub fn new() -> Self {
        let (cursor_tx, _) = watch::channel(ReplayCursor::default());
        let (state_tx, _) = watch::channel(ReplayState::Idle);
        Self {
            history: None,
            store: None,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    session_id: None,
                    events: Arc::new(Vec::new()),
                    generation: 0,
                    closed: false,
                    next_playback_id: 1,
                    playback: None,
                }),
                cursor_tx,
                state_tx,
            }),
        }
    }

    /// Remote session-history collaborator used when no history is provided
    pub fn with_history_source(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.history = Some(source);
        self
    }

    /// Local store consulted when the remote history is unavailable or empty
    pub fn with_store(mut self, store: Arc<dyn EventLogStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Obtain the event sequence for `session_id`.
    ///
    /// A non-empty `provided` history is used as-is. Otherwise the history
    /// source is asked, falling back to the locally recorded log. Failures
    /// come back as [`ReplayState::Error`] or [`ReplayState::Empty`]. A load
    /// overtaken by another load or by [`close`](Self::close) is discarded.
    pub async fn load(&self, session_id: &str, provided: Option<Vec<HistoryEntry>>) -> ReplayState {
        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return self.state();
            }
            self.shared.stop_locked(&mut inner);
            inner.generation += 1;
            inner.session_id = Some(session_id.to_string());
            inner.events = Arc::new(Vec::new());
            self.shared.cursor_tx.send_modify(|cursor| cursor.position = 0);
            self.shared.set_state(ReplayState::Loading);
            inner.generation
        };

        let (events, error) = match provided.filter(|entries| !entries.is_empty()) {
            Some(entries) => (entries, None),
            None => self.fetch(session_id).await,
        };

        let mut inner = self.shared.inner.lock();
        if inner.closed || inner.generation != generation {
            tracing::debug!(session_id, "Discarding superseded history load");
            drop(inner);
            return self.state();
        }

        let mut events = events;
        events.sort_by_key(|e| e.timestamp);
        let state = match (events.is_empty(), error) {
            (false, _) => ReplayState::Ready {
                events: events.len(),
            },
            (true, Some(message)) => ReplayState::Error { message },
            (true, None) => ReplayState::Empty,
        };
        inner.events = Arc::new(events);
        self.shared.set_state(state.clone());
        state
    }

    async fn fetch(&self, session_id: &str) -> (Vec<HistoryEntry>, Option<String>) {
        let mut error = None;
        if let Some(source) = self.history.as_ref() {
            match source.get_history(session_id).await {
                Ok(entries) if !entries.is_empty() => return (entries, None),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(session_id, error = %err, "Failed to fetch session history");
                    error = Some(err.to_string());
                }
            }
        }
        let local = self.local_history(session_id);
        if !local.is_empty() {
            return (local, None);
        }
        (local, error)
    }

    fn local_history(&self, session_id: &str) -> Vec<HistoryEntry> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };
        store
            .read(&session_log_key(session_id))
            .iter()
            .filter_map(HistoryEntry::from_log_event)
            .collect()
    }

    /// Move the cursor, pausing any running playback. Positions past the end clamp to the end.
    pub fn seek(&self, position: usize) {
        let mut inner = self.shared.inner.lock();
        self.shared.stop_locked(&mut inner);
        let position = position.min(inner.events.len());
        self.shared.cursor_tx.send_if_modified(|cursor| {
            let changed = cursor.position != position;
            cursor.position = position;
            changed
        });
    }

    /// Start advancing the cursor from its current position.
    ///
    /// Each step waits for the gap to the next event's timestamp divided by
    /// `speed`; the first event from position 0 is shown immediately. The
    /// cursor pauses itself at the end.
    pub fn play(&self, speed: f64) -> Result<PlaybackHandle, ReplayError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ReplayError::InvalidSpeed(speed));
        }

        let mut inner = self.shared.inner.lock();
        self.shared.stop_locked(&mut inner);

        let id = inner.next_playback_id;
        inner.next_playback_id += 1;
        let token = CancellationToken::new();
        let handle = PlaybackHandle {
            id,
            token: token.clone(),
            shared: Arc::downgrade(&self.shared),
        };

        let start = self.shared.cursor_tx.borrow().position;
        let events = inner.events.clone();
        self.shared.cursor_tx.send_modify(|cursor| cursor.speed = speed);
        if inner.closed || start >= events.len() {
            token.cancel();
            return Ok(handle);
        }

        inner.playback = Some((id, token.clone()));
        self.shared.cursor_tx.send_modify(|cursor| cursor.playing = true);
        drop(inner);

        let shared = self.shared.clone();
        tokio::spawn(run_playback(shared, events, start, speed, id, token));
        Ok(handle)
    }

    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.stop_locked(&mut inner);
    }

    /// Tear down: stop playback and discard any in-flight load
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared.stop_locked(&mut inner);
        inner.closed = true;
        inner.generation += 1;
        self.shared.set_state(ReplayState::Idle);
    }

    pub fn cursor(&self) -> ReplayCursor {
        *self.shared.cursor_tx.borrow()
    }

    pub fn state(&self) -> ReplayState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.inner.lock().session_id.clone()
    }

    pub fn events(&self) -> Arc<Vec<HistoryEntry>> {
        self.shared.inner.lock().events.clone()
    }

    /// Events revealed by the cursor so far
    pub fn visible_events(&self) -> Vec<HistoryEntry> {
        let inner = self.shared.inner.lock();
        let position = self.shared.cursor_tx.borrow().position.min(inner.events.len());
        inner.events[..position].to_vec()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReplayCursor> {
        self.shared.cursor_tx.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ReplayState> {
        self.shared.state_tx.subscribe()
    }
}

impl Default for SessionReplayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionReplayer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Furthest from the playback origin any event will be scheduled.
pub const MAX_PLAYBACK_OFFSET: Duration = Duration::from_secs(24 * 60 * 60);

/// Offset of event `index` from the playback origin, scaled by `speed` and
/// saturated at [`MAX_PLAYBACK_OFFSET`].
fn scaled_offset(events: &[HistoryEntry], origin: u64, index: usize, speed: f64) -> Duration {
    let gap_ms = events[index].timestamp.saturating_sub(origin) as f64;
    Duration::try_from_secs_f64(gap_ms / speed / 1000.0)
        .map(|offset| offset.min(MAX_PLAYBACK_OFFSET))
        .unwrap_or(MAX_PLAYBACK_OFFSET)
}

async fn run_playback(
    shared: Arc<Shared>,
    events: Arc<Vec<HistoryEntry>>,
    start: usize,
    speed: f64,
    id: u64,
    token: CancellationToken,
) {
    // Deadlines are measured from one origin so rounding never accumulates
    let origin = if start == 0 {
        events[0].timestamp
    } else {
        events[start - 1].timestamp
    };
    let started_at = Instant::now();

    for index in start..events.len() {
        let offset = scaled_offset(&events, origin, index, speed);
        let deadline = started_at
            .checked_add(offset)
            .unwrap_or_else(|| Instant::now() + MAX_PLAYBACK_OFFSET);
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let mut inner = shared.inner.lock();
        if token.is_cancelled() {
            return;
        }
        let position = index + 1;
        let finished = position >= events.len();
        shared.cursor_tx.send_modify(|cursor| {
            cursor.position = position;
            if finished {
                cursor.playing = false;
            }
        });
        if finished {
            if matches!(inner.playback, Some((current, _)) if current == id) {
                inner.playback = None;
            }
            token.cancel();
        }
    }
}
