pub mod config;
pub mod connectivity;
pub mod core;
pub mod data;
pub mod eventlog;
pub mod queue;
pub mod session;
pub mod util;
pub mod web;

pub use config::Config;
pub use connectivity::{ConnectivityHandle, ConnectivityMonitor, Transition};
pub use crate::core::StackdeckCore;
pub use data::{Database, KvStore, MemoryKvStore, SqliteKvStore, StorageError};
pub use eventlog::{
    CompactionPolicy, EventLogStore, LogEvent, MemoryEventLogStore, NewEvent,
    PersistentEventLogStore,
};
pub use queue::{
    ActionQueue, ActionStatus, DrainReport, HttpExecutor, QueuedAction, RemoteExecutor,
    RetryPolicy, SyncService,
};
pub use session::{
    HistoryEntry, HistorySource, ReplayCursor, ReplayState, SessionRecorder, SessionReplayer,
    SessionTape,
};
