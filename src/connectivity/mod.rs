//! Process-wide network reachability.
//!
//! [`ConnectivityMonitor`] is the only writer of the online flag. Consumers get
//! a read-only [`ConnectivityHandle`] or a stream of [`Transition`]s.

mod probe;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

pub use probe::{ProbeConfig, ProbeHandle};

/// An observed change of reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

struct Inner {
    state: watch::Sender<bool>,
    transitions: broadcast::Sender<Transition>,
}

#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (transitions, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner { state, transitions }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Feed the environment's connectivity signal. Repeating the current
    /// value is ignored; only real transitions are broadcast.
    pub fn set_online(&self, online: bool) {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return;
        }

        let transition = if online {
            Transition::WentOnline
        } else {
            Transition::WentOffline
        };
        tracing::info!(?transition, "Connectivity changed");
        // No subscribers is fine
        let _ = self.inner.transitions.send(transition);
    }

    /// Read-only view for consumers that must never write the flag
    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            state: self.inner.state.subscribe(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.inner.transitions.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish()
    }
}

/// Read-only connectivity state injected into the action queue.
#[derive(Clone)]
pub struct ConnectivityHandle {
    state: watch::Receiver<bool>,
}

impl ConnectivityHandle {
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Raw state receiver, for callers that want to await changes
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.clone()
    }
}

impl std::fmt::Debug for ConnectivityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityHandle")
            .field("online", &self.is_online())
            .finish()
    }
}
