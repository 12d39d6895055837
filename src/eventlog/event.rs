use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::util::now_ms;

/// Log key owned by the offline action queue.
pub const ACTION_QUEUE_LOG: &str = "offline-action-queue";

/// Prefix shared by every recorded terminal session log.
pub const SESSION_LOG_PREFIX: &str = "session:";

/// Log key for a recorded terminal session.
pub fn session_log_key(session_id: &str) -> String {
    format!("{SESSION_LOG_PREFIX}{session_id}")
}

/// A single immutable entry of an event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Unique within its log
    pub id: String,
    /// Domain tag ("command", "output", "action", ...)
    pub kind: String,
    pub payload: Value,
    /// Milliseconds; non-decreasing in read order
    pub timestamp: u64,
}

/// Input to [`EventLogStore::append`](super::EventLogStore::append).
///
/// `id` and `timestamp` are filled in by the store when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub id: Option<String>,
    pub kind: String,
    pub payload: Value,
    pub timestamp: Option<u64>,
}

impl NewEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            payload,
            timestamp: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn into_event(self) -> LogEvent {
        LogEvent {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: self.kind,
            payload: self.payload,
            timestamp: self.timestamp.unwrap_or_else(now_ms),
        }
    }
}

impl From<LogEvent> for NewEvent {
    fn from(event: LogEvent) -> Self {
        Self {
            id: Some(event.id),
            kind: event.kind,
            payload: event.payload,
            timestamp: Some(event.timestamp),
        }
    }
}
