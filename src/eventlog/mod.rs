//! Durable, timestamp-ordered event logs.
//!
//! Every subsystem owns a disjoint log key. The store keeps the authoritative
//! copy in memory and mirrors it to a [`KvStore`](crate::data::KvStore) after
//! each mutation; storage failures degrade durability but never availability.

mod compaction;
mod event;
mod store;

pub use compaction::CompactionPolicy;
pub use event::{session_log_key, LogEvent, NewEvent, ACTION_QUEUE_LOG, SESSION_LOG_PREFIX};
pub use store::{EventLogStore, MemoryEventLogStore, PersistentEventLogStore};
