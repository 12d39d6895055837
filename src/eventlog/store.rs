use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::{KvStore, MemoryKvStore, StorageError};

use super::compaction::CompactionPolicy;
use super::event::{LogEvent, NewEvent};

/// Capability interface over named event logs.
///
/// None of the operations fail: persistence problems are logged and the
/// in-memory state keeps serving reads for the rest of the process.
pub trait EventLogStore: Send + Sync {
    /// Insert in timestamp order (after existing events with an equal
    /// timestamp) and persist before returning. Appending an id that is
    /// already present is a no-op returning the stored event.
    fn append(&self, key: &str, event: NewEvent) -> LogEvent;

    /// Ordered contents of a log; empty if it was never written.
    fn read(&self, key: &str) -> Vec<LogEvent>;

    /// Remove every event of a log. Idempotent.
    fn clear(&self, key: &str);

    /// Overwrite a log in one step. The input is stable-sorted by timestamp.
    fn replace(&self, key: &str, events: Vec<LogEvent>);

    /// Read-modify-replace with no append, replace or clear of the same log
    /// interleaving; the result is stable-sorted by timestamp and persisted.
    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Vec<LogEvent>));

    /// Apply the compaction policy now, returning the number of evicted events.
    fn compact(&self, key: &str) -> usize;

    /// Keys of every non-empty log known to this store.
    fn keys(&self) -> Vec<String>;
}

impl<T: EventLogStore + ?Sized> EventLogStore for Arc<T> {
    fn append(&self, key: &str, event: NewEvent) -> LogEvent {
        (**self).append(key, event)
    }

    fn read(&self, key: &str) -> Vec<LogEvent> {
        (**self).read(key)
    }

    fn clear(&self, key: &str) {
        (**self).clear(key)
    }

    fn replace(&self, key: &str, events: Vec<LogEvent>) {
        (**self).replace(key, events)
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Vec<LogEvent>)) {
        (**self).modify(key, f)
    }

    fn compact(&self, key: &str) -> usize {
        (**self).compact(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// Event log store mirrored into a key/value backend as one JSON array per log.
pub struct PersistentEventLogStore<S> {
    kv: S,
    policy: CompactionPolicy,
    cache: Mutex<HashMap<String, Vec<LogEvent>>>,
    persistence_failures: AtomicU64,
}

/// Store that never touches disk; used for tests and ephemeral sessions.
pub type MemoryEventLogStore = PersistentEventLogStore<MemoryKvStore>;

impl MemoryEventLogStore {
    pub fn in_memory() -> Self {
        Self::new(MemoryKvStore::new())
    }
}

impl<S: KvStore> PersistentEventLogStore<S> {
    pub fn new(kv: S) -> Self {
        Self::with_policy(kv, CompactionPolicy::default())
    }

    pub fn with_policy(kv: S, policy: CompactionPolicy) -> Self {
        Self {
            kv,
            policy,
            cache: Mutex::new(HashMap::new()),
            persistence_failures: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Number of writes that could not be persisted since this store was created
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    fn record_failure(&self, key: &str, op: &'static str, err: &StorageError) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(key, op, error = %err, "Event log persistence failed; continuing in memory");
    }

    fn load(&self, key: &str) -> Vec<LogEvent> {
        let raw = match self.kv.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to load event log; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<LogEvent>>(&raw) {
            Ok(mut events) => {
                events.sort_by_key(|e| e.timestamp);
                events
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "Stored event log is corrupted; starting empty");
                Vec::new()
            }
        }
    }

    fn persist(&self, key: &str, events: &[LogEvent]) {
        if events.is_empty() {
            if let Err(err) = self.kv.remove(key) {
                self.record_failure(key, "remove", &err);
            }
            return;
        }
        let json = match serde_json::to_string(events) {
            Ok(json) => json,
            Err(err) => {
                self.persistence_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %err, "Failed to serialize event log");
                return;
            }
        };
        if let Err(err) = self.kv.set(key, &json) {
            self.record_failure(key, "set", &err);
        }
    }

    /// Run `f` against the cached log for `key`, loading it first if needed
    fn with_log<T>(&self, key: &str, f: impl FnOnce(&mut Vec<LogEvent>) -> T) -> T {
        let mut cache = self.cache.lock();
        if !cache.contains_key(key) {
            let loaded = self.load(key);
            cache.insert(key.to_string(), loaded);
        }
        let log = cache.entry(key.to_string()).or_default();
        f(log)
    }
}

impl<S: KvStore> EventLogStore for PersistentEventLogStore<S> {
    fn append(&self, key: &str, event: NewEvent) -> LogEvent {
        let event = event.into_event();
        self.with_log(key, |log| {
            if let Some(existing) = log.iter().find(|e| e.id == event.id) {
                tracing::debug!(key, id = %event.id, "Ignoring duplicate append");
                return existing.clone();
            }
            let at = log.partition_point(|e| e.timestamp <= event.timestamp);
            log.insert(at, event.clone());
            self.policy.apply(key, log);
            self.persist(key, log);
            event
        })
    }

    fn read(&self, key: &str) -> Vec<LogEvent> {
        self.with_log(key, |log| log.clone())
    }

    fn clear(&self, key: &str) {
        self.with_log(key, |log| {
            log.clear();
            self.persist(key, log);
        })
    }

    fn replace(&self, key: &str, mut events: Vec<LogEvent>) {
        events.sort_by_key(|e| e.timestamp);
        self.with_log(key, |log| {
            *log = events;
            self.persist(key, log);
        })
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Vec<LogEvent>)) {
        self.with_log(key, |log| {
            f(log);
            log.sort_by_key(|e| e.timestamp);
            self.persist(key, log);
        })
    }

    fn compact(&self, key: &str) -> usize {
        self.with_log(key, |log| {
            let evicted = self.policy.apply(key, log);
            if evicted > 0 {
                self.persist(key, log);
            }
            evicted
        })
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = match self.kv.keys() {
            Ok(keys) => keys.into_iter().collect(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to list stored event logs");
                BTreeSet::new()
            }
        };
        for (key, log) in self.cache.lock().iter() {
            if log.is_empty() {
                keys.remove(key);
            } else {
                keys.insert(key.clone());
            }
        }
        keys.into_iter().collect()
    }
}
