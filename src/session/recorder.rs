use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::eventlog::{session_log_key, EventLogStore};
use crate::util::now_ms;

use super::history::HistoryEntry;
use super::scrub::ScrubConfig;

/// Captures a live terminal session into its `session:<id>` log.
///
/// Recording never blocks the terminal transport: entries are timestamped on
/// the caller's side and handed to a background writer over an unbounded
/// channel.
pub struct SessionRecorder {
    session_id: String,
    tx: Option<mpsc::UnboundedSender<HistoryEntry>>,
    writer: Option<JoinHandle<usize>>,
}

impl SessionRecorder {
    pub fn start(store: Arc<dyn EventLogStore>, session_id: impl Into<String>) -> Self {
        Self::start_with_scrubber(store, session_id, None)
    }

    pub fn start_with_scrubber(
        store: Arc<dyn EventLogStore>,
        session_id: impl Into<String>,
        scrubber: Option<ScrubConfig>,
    ) -> Self {
        let session_id = session_id.into();
        let key = session_log_key(&session_id);
        let (tx, mut rx) = mpsc::unbounded_channel::<HistoryEntry>();

        let writer = tokio::spawn(async move {
            let mut written = 0usize;
            while let Some(mut entry) = rx.recv().await {
                if let Some(scrubber) = scrubber.as_ref() {
                    scrubber.scrub_entry(&mut entry);
                }
                store.append(&key, entry.to_new_event());
                written += 1;
            }
            tracing::debug!(key = %key, written, "Session recorder stopped");
            written
        });

        Self {
            session_id,
            tx: Some(tx),
            writer: Some(writer),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record_command(&self, text: &str) {
        self.record(HistoryEntry::command(text, now_ms()));
    }

    pub fn record_output(&self, chunk: &str) {
        self.record(HistoryEntry::output(chunk, now_ms()));
    }

    /// Record an entry whose capture time is already known
    pub fn record(&self, entry: HistoryEntry) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(entry).is_err() {
            tracing::debug!(session_id = %self.session_id, "Session recorder writer is gone");
        }
    }

    /// Flush everything recorded so far and stop the writer.
    /// Returns the number of entries written.
    pub async fn finish(mut self) -> usize {
        self.tx.take();
        match self.writer.take() {
            Some(writer) => writer.await.unwrap_or_else(|err| {
                tracing::warn!(session_id = %self.session_id, error = %err, "Session writer task failed");
                0
            }),
            None => 0,
        }
    }
}
