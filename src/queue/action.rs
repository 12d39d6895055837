use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eventlog::{LogEvent, NewEvent};

/// Event kind under which queued actions are stored.
pub const ACTION_KIND: &str = "action";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Sent,
    Failed,
}

impl ActionStatus {
    /// Whether the next drain pass should attempt delivery
    pub fn is_deliverable(&self) -> bool {
        matches!(self, ActionStatus::Pending | ActionStatus::Failed)
    }
}

/// Payload of an `action` log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionRecord {
    action: Value,
    status: ActionStatus,
    attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// A user action waiting for (or having completed) remote delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedAction {
    pub id: String,
    pub timestamp: u64,
    pub payload: Value,
    pub status: ActionStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedAction {
    pub(crate) fn new_event(payload: Value) -> NewEvent {
        let record = ActionRecord {
            action: payload,
            status: ActionStatus::Pending,
            attempts: 0,
            last_error: None,
        };
        NewEvent::new(ACTION_KIND, record_to_value(&record))
    }

    /// Decode a log event; returns `None` for foreign kinds or malformed payloads
    pub fn from_event(event: &LogEvent) -> Option<Self> {
        if event.kind != ACTION_KIND {
            return None;
        }
        match serde_json::from_value::<ActionRecord>(event.payload.clone()) {
            Ok(record) => Some(Self {
                id: event.id.clone(),
                timestamp: event.timestamp,
                payload: record.action,
                status: record.status,
                attempts: record.attempts,
                last_error: record.last_error,
            }),
            Err(err) => {
                tracing::warn!(id = %event.id, error = %err, "Skipping malformed queued action");
                None
            }
        }
    }

    pub fn to_event(&self) -> LogEvent {
        let record = ActionRecord {
            action: self.payload.clone(),
            status: self.status,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
        };
        LogEvent {
            id: self.id.clone(),
            kind: ACTION_KIND.to_string(),
            payload: record_to_value(&record),
            timestamp: self.timestamp,
        }
    }

    pub(crate) fn mark_failed(&mut self, error: String) {
        self.status = ActionStatus::Failed;
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
    }
}

fn record_to_value(record: &ActionRecord) -> Value {
    // ActionRecord has only string keys and JSON values
    serde_json::to_value(record).unwrap_or(Value::Null)
}
