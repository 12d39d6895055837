//! Size policy applied to logs after every append.
//!
//! Session logs rotate out their oldest events once they pass
//! `max_session_events`. The action queue is never trimmed: exceeding
//! `max_queue_len` only produces a warning.

use super::event::{LogEvent, ACTION_QUEUE_LOG, SESSION_LOG_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub max_session_events: Option<usize>,
    pub max_queue_len: Option<usize>,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            max_session_events: Some(5000),
            max_queue_len: Some(1000),
        }
    }
}

impl CompactionPolicy {
    /// A policy that never evicts or warns
    pub fn unbounded() -> Self {
        Self {
            max_session_events: None,
            max_queue_len: None,
        }
    }

    /// Apply the policy to `events` (stored under `key`), returning how many were evicted
    pub fn apply(&self, key: &str, events: &mut Vec<LogEvent>) -> usize {
        if key.starts_with(SESSION_LOG_PREFIX) {
            if let Some(max) = self.max_session_events {
                if events.len() > max {
                    let excess = events.len() - max;
                    events.drain(..excess);
                    tracing::debug!(key, evicted = excess, "Rotated oldest session events");
                    return excess;
                }
            }
        } else if key == ACTION_QUEUE_LOG {
            if let Some(max) = self.max_queue_len {
                if events.len() > max {
                    tracing::warn!(
                        key,
                        len = events.len(),
                        max,
                        "Offline action queue is over its soft limit; nothing is dropped"
                    );
                }
            }
        }
        0
    }
}
