//! Session history entries and the remote source they are fetched from.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::eventlog::{LogEvent, NewEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Command,
    Output,
    #[serde(other)]
    Other,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Command => "command",
            EntryType::Output => "output",
            EntryType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "command" => EntryType::Command,
            "output" => EntryType::Output,
            _ => EntryType::Other,
        }
    }
}

/// One captured terminal chunk, as exchanged with the history collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub data: String,
    pub timestamp: u64,
}

impl HistoryEntry {
    pub fn command(data: impl Into<String>, timestamp: u64) -> Self {
        Self {
            entry_type: EntryType::Command,
            data: data.into(),
            timestamp,
        }
    }

    pub fn output(data: impl Into<String>, timestamp: u64) -> Self {
        Self {
            entry_type: EntryType::Output,
            data: data.into(),
            timestamp,
        }
    }

    pub fn to_new_event(&self) -> NewEvent {
        NewEvent::new(self.entry_type.as_str(), json!({ "data": self.data })).at(self.timestamp)
    }

    /// Decode a recorded session event; events without text data are skipped
    pub fn from_log_event(event: &LogEvent) -> Option<Self> {
        let data = event.payload.get("data")?.as_str()?;
        Some(Self {
            entry_type: EntryType::parse(&event.kind),
            data: data.to_string(),
            timestamp: event.timestamp,
        })
    }
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("History unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid history URL: {0}")]
    InvalidUrl(String),
}

/// The external service that keeps terminal session history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// Fetches `GET {base_url}/sessions/{id}/history`.
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpHistorySource {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, HistoryError> {
        let raw = base_url.as_ref();
        let base_url = reqwest::Url::parse(raw)
            .map_err(|err| HistoryError::InvalidUrl(format!("{raw}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HistoryError::InvalidUrl(raw.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Session ids are pushed as a single percent-encoded path segment
    fn history_url(&self, session_id: &str) -> Result<reqwest::Url, HistoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HistoryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["sessions", session_id, "history"]);
        Ok(url)
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let url = self.history_url(session_id)?;
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(HistoryError::NotFound(session_id.to_string()));
        }
        let response = response.error_for_status()?;
        Ok(response.json::<Vec<HistoryEntry>>().await?)
    }
}
