//! Drives the action queue from connectivity transitions.
//!
//! Every `WentOnline` triggers one drain. Transitions that pile up while a
//! drain is running collapse into a single follow-up pass. While online with
//! actions still queued (failed, or pending ones no drain picked up), further
//! passes are scheduled with exponential backoff; nothing is ever dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connectivity::{ConnectivityMonitor, Transition};

use super::ActionQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Shortest retry delay the sync loop will schedule.
    pub const MIN_BASE: Duration = Duration::from_millis(100);

    /// Build a policy with `base >= MIN_BASE` and `max >= base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Self::MIN_BASE);
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay before the next automatic pass for an action that failed `attempts` times
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let policy = Self::new(self.base, self.max);
        let exp = attempts.saturating_sub(1).min(20);
        policy.base.saturating_mul(1u32 << exp).min(policy.max)
    }
}

/// Running sync task. Dropping it (or calling [`shutdown`](Self::shutdown))
/// unsubscribes from connectivity changes.
pub struct SyncService {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn start(queue: Arc<ActionQueue>, monitor: &ConnectivityMonitor, retry: RetryPolicy) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let transitions = monitor.subscribe();
        let connectivity = monitor.handle();
        let initially_online = monitor.is_online();

        let task = tokio::spawn(async move {
            run(queue, transitions, connectivity, retry, initially_online, token).await;
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    queue: Arc<ActionQueue>,
    mut transitions: broadcast::Receiver<Transition>,
    connectivity: crate::connectivity::ConnectivityHandle,
    retry: RetryPolicy,
    initially_online: bool,
    cancel: CancellationToken,
) {
    // Actions left over from a previous run are flushed right away
    let mut drain_now = initially_online && queue.size() > 0;

    loop {
        if drain_now {
            drain_now = false;
            queue.drain().await;
            collapse_backlog(&mut transitions);
        }

        let backoff = if connectivity.is_online() {
            // Never-attempted actions wait `delay_for(0)`, the base delay
            queue
                .pending()
                .iter()
                .map(|a| a.attempts)
                .min()
                .map(|attempts| retry.delay_for(attempts))
        } else {
            None
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            received = transitions.recv() => match received {
                Ok(Transition::WentOnline) | Err(RecvError::Lagged(_)) => {
                    drain_now = connectivity.is_online();
                }
                Ok(Transition::WentOffline) => {}
                Err(RecvError::Closed) => break,
            },
            _ = sleep_or_forever(backoff) => {
                tracing::debug!("Retrying queued actions after backoff");
                drain_now = connectivity.is_online();
            }
        }
    }
    tracing::debug!("Action queue sync stopped");
}

/// Drop transitions that arrived during a drain; the pass already covered them.
fn collapse_backlog(transitions: &mut broadcast::Receiver<Transition>) {
    while let Ok(transition) = transitions.try_recv() {
        tracing::trace!(?transition, "Collapsed connectivity flap");
    }
}

async fn sleep_or_forever(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
