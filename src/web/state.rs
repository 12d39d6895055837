//! Shared state for the status API handlers.

use std::sync::Arc;

use crate::connectivity::ConnectivityMonitor;
use crate::eventlog::EventLogStore;
use crate::queue::ActionQueue;

/// Cheaply cloneable handle to the running engine.
#[derive(Clone)]
pub struct WebAppState {
    queue: Arc<ActionQueue>,
    connectivity: ConnectivityMonitor,
    store: Arc<dyn EventLogStore>,
}

impl WebAppState {
    pub fn new(
        queue: Arc<ActionQueue>,
        connectivity: ConnectivityMonitor,
        store: Arc<dyn EventLogStore>,
    ) -> Self {
        Self {
            queue,
            connectivity,
            store,
        }
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn store(&self) -> &dyn EventLogStore {
        self.store.as_ref()
    }
}
