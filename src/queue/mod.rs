//! Offline action queue.
//!
//! User actions are appended to the `offline-action-queue` log, delivered to a
//! [`RemoteExecutor`] when connectivity allows, and kept until delivery succeeds.

mod action;
mod action_queue;
mod executor;
mod sync;

pub use action::{ActionStatus, QueuedAction, ACTION_KIND};
pub use action_queue::{ActionOutcome, ActionQueue, DrainReport};
pub use executor::{ExecutorError, HttpExecutor, RemoteExecutor, UnconfiguredExecutor};
pub use sync::{RetryPolicy, SyncService};
