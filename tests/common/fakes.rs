//! In-process stand-ins for the remote collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use stackdeck::queue::ExecutorError;
use stackdeck::session::HistoryError;
use stackdeck::{HistoryEntry, HistorySource, RemoteExecutor};

/// Records every payload it is asked to execute; fails on demand.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Value>>,
    fail: AtomicBool,
    latency: Option<Duration>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let executor = Self::default();
        executor.set_failing(true);
        executor
    }

    /// Each call takes `latency` (tokio time) before it resolves
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn execute(&self, payload: &Value) -> Result<(), ExecutorError> {
        self.calls.lock().push(payload.clone());
        // Let concurrent callers interleave at the remote call
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExecutorError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// History service that is always down.
pub struct FailingHistorySource;

#[async_trait]
impl HistorySource for FailingHistorySource {
    async fn get_history(&self, _session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Err(HistoryError::Unavailable("connection refused".to_string()))
    }
}

/// History service that serves a fixed timeline.
pub struct StaticHistorySource(pub Vec<HistoryEntry>);

#[async_trait]
impl HistorySource for StaticHistorySource {
    async fn get_history(&self, _session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.0.clone())
    }
}
