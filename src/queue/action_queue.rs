use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::connectivity::ConnectivityHandle;
use crate::eventlog::{EventLogStore, ACTION_QUEUE_LOG};

use super::action::{ActionStatus, QueuedAction};
use super::executor::RemoteExecutor;

/// Result of delivering one action during a drain pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn is_sent(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a `drain()` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    /// True when another drain was already running and this call did nothing
    pub skipped: bool,
    pub outcomes: Vec<ActionOutcome>,
}

impl DrainReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

/// Clears the in-flight flag even if the drain future is dropped mid-await.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Offline-tolerant queue of user actions.
///
/// Actions are persisted as `pending` before any delivery attempt and are only
/// removed from the log once the remote executor accepted them.
pub struct ActionQueue {
    store: Arc<dyn EventLogStore>,
    executor: Arc<dyn RemoteExecutor>,
    connectivity: ConnectivityHandle,
    draining: AtomicBool,
    rerun_requested: AtomicBool,
    size_tx: watch::Sender<usize>,
}

impl ActionQueue {
    pub fn new(
        store: Arc<dyn EventLogStore>,
        executor: Arc<dyn RemoteExecutor>,
        connectivity: ConnectivityHandle,
    ) -> Self {
        let initial = Self::count(store.as_ref());
        let (size_tx, _) = watch::channel(initial);
        Self {
            store,
            executor,
            connectivity,
            draining: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
            size_tx,
        }
    }

    fn count(store: &dyn EventLogStore) -> usize {
        store
            .read(ACTION_QUEUE_LOG)
            .iter()
            .filter_map(QueuedAction::from_event)
            .count()
    }

    fn actions(&self) -> Vec<QueuedAction> {
        self.store
            .read(ACTION_QUEUE_LOG)
            .iter()
            .filter_map(QueuedAction::from_event)
            .collect()
    }

    fn publish_size(&self) {
        let size = Self::count(self.store.as_ref());
        self.size_tx.send_if_modified(|current| {
            let changed = *current != size;
            *current = size;
            changed
        });
    }

    /// Persist `payload` as a pending action and, when online, try to deliver
    /// it right away. Returns the action as it stands afterwards.
    pub async fn enqueue(&self, payload: Value) -> QueuedAction {
        let event = self
            .store
            .append(ACTION_QUEUE_LOG, QueuedAction::new_event(payload));
        self.publish_size();

        let mut action = QueuedAction::from_event(&event).unwrap_or_else(|| QueuedAction {
            id: event.id.clone(),
            timestamp: event.timestamp,
            payload: Value::Null,
            status: ActionStatus::Pending,
            attempts: 0,
            last_error: None,
        });
        tracing::debug!(id = %action.id, online = self.connectivity.is_online(), "Enqueued action");

        if !self.connectivity.is_online() {
            return action;
        }

        // Raised before trying for the drain flag so a drain that is already
        // running (or just finishing) makes another pass for this action
        self.rerun_requested.store(true, Ordering::SeqCst);
        let report = self.drain().await;
        if report.skipped {
            return action;
        }
        if let Some(outcome) = report.outcomes.iter().find(|o| o.id == action.id) {
            match &outcome.error {
                None => action.status = ActionStatus::Sent,
                Some(err) => action.mark_failed(err.clone()),
            }
        }
        action
    }

    /// Attempt delivery of every pending or failed action, oldest first.
    ///
    /// Only one drain runs at a time; a call made while another is in flight
    /// returns [`DrainReport::skipped`] without touching the executor. Each
    /// action is attempted at most once per call.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::skipped();
        let mut attempted = HashSet::new();
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                if report.skipped {
                    tracing::debug!("Drain already in flight; skipping");
                }
                break;
            }
            report.skipped = false;

            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    self.rerun_requested.store(false, Ordering::SeqCst);
                    self.drain_pass(&mut attempted, &mut report).await;
                    if !self.rerun_requested.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }

            // A request raised while the flag was being released is served here
            if !self.rerun_requested.load(Ordering::SeqCst) {
                break;
            }
        }
        if report.skipped {
            return report;
        }

        if !report.outcomes.is_empty() {
            tracing::info!(
                sent = report.sent(),
                failed = report.failed(),
                remaining = self.size(),
                "Drained offline action queue"
            );
        }
        report
    }

    async fn drain_pass(&self, attempted: &mut HashSet<String>, report: &mut DrainReport) {
        let batch: Vec<QueuedAction> = self
            .actions()
            .into_iter()
            .filter(|a| a.status.is_deliverable() && !attempted.contains(&a.id))
            .collect();

        for action in batch {
            attempted.insert(action.id.clone());
            let result = self.executor.execute(&action.payload).await;
            let error = result.err().map(|e| e.to_string());

            let id = action.id.clone();
            let failure = error.clone();
            self.store.modify(ACTION_QUEUE_LOG, &mut |events| match &failure {
                None => events.retain(|e| e.id != id),
                Some(err) => {
                    for event in events.iter_mut().filter(|e| e.id == id) {
                        if let Some(mut current) = QueuedAction::from_event(event) {
                            current.mark_failed(err.clone());
                            *event = current.to_event();
                        }
                    }
                }
            });

            match &error {
                None => tracing::debug!(id = %action.id, "Action delivered"),
                Some(err) => tracing::warn!(
                    id = %action.id,
                    attempts = action.attempts + 1,
                    error = %err,
                    "Action delivery failed; keeping it queued"
                ),
            }
            report.outcomes.push(ActionOutcome {
                id: action.id,
                error,
            });
            self.publish_size();
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Number of actions still in the log
    pub fn size(&self) -> usize {
        Self::count(self.store.as_ref())
    }

    /// Actions awaiting delivery (pending or failed), oldest first
    pub fn pending(&self) -> Vec<QueuedAction> {
        self.actions()
            .into_iter()
            .filter(|a| a.status.is_deliverable())
            .collect()
    }

    pub fn failed(&self) -> Vec<QueuedAction> {
        self.actions()
            .into_iter()
            .filter(|a| a.status == ActionStatus::Failed)
            .collect()
    }

    /// User-initiated removal. Returns whether the action was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.store.modify(ACTION_QUEUE_LOG, &mut |events| {
            let before = events.len();
            events.retain(|e| e.id != id);
            removed = events.len() != before;
        });
        if removed {
            tracing::info!(id, "Removed queued action");
            self.publish_size();
        }
        removed
    }

    /// Queue size notifications for badges and "sync now" affordances
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.size_tx.subscribe()
    }
}
