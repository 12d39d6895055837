use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ProbeHandle};
use crate::data::{Database, MemoryKvStore, SqliteKvStore};
use crate::eventlog::{EventLogStore, PersistentEventLogStore};
use crate::queue::{ActionQueue, HttpExecutor, RemoteExecutor, SyncService, UnconfiguredExecutor};
use crate::session::{
    HistorySource, HttpHistorySource, ScrubConfig, SessionRecorder, SessionReplayer,
};
use crate::web::WebAppState;

/// Core infrastructure shared between the CLI commands and the web server.
pub struct StackdeckCore {
    config: Config,
    /// Database connection (owned to keep connection alive)
    _database: Option<Database>,
    store: Arc<dyn EventLogStore>,
    connectivity: ConnectivityMonitor,
    queue: Arc<ActionQueue>,
    history: Option<Arc<dyn HistorySource>>,
}

/// Tasks that keep the engine in sync while the process runs.
pub struct BackgroundServices {
    sync: SyncService,
    probe: Option<ProbeHandle>,
}

impl BackgroundServices {
    pub async fn shutdown(self) {
        if let Some(probe) = self.probe {
            probe.shutdown().await;
        }
        self.sync.shutdown().await;
    }
}

impl StackdeckCore {
    /// Open the default database and build every subsystem from `config`.
    ///
    /// A database that cannot be opened degrades to an in-memory store so the
    /// console keeps working, without durability.
    pub fn new(config: Config) -> Self {
        let database = match Database::open_default() {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open database; event logs will not persist");
                None
            }
        };
        Self::with_database(config, database)
    }

    pub fn with_database(config: Config, database: Option<Database>) -> Self {
        let policy = config.compaction_policy();
        let store: Arc<dyn EventLogStore> = match &database {
            Some(db) => Arc::new(PersistentEventLogStore::with_policy(
                SqliteKvStore::from_database(db),
                policy,
            )),
            None => Arc::new(PersistentEventLogStore::with_policy(
                MemoryKvStore::new(),
                policy,
            )),
        };

        // Assume online until a probe or the host says otherwise
        let connectivity = ConnectivityMonitor::new(true);
        let executor = build_executor(&config);
        let queue = Arc::new(ActionQueue::new(
            store.clone(),
            executor,
            connectivity.handle(),
        ));
        let history = build_history_source(&config);

        Self {
            config,
            _database: database,
            store,
            connectivity,
            queue,
            history,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn EventLogStore> {
        self.store.clone()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn queue(&self) -> Arc<ActionQueue> {
        self.queue.clone()
    }

    /// Start the sync loop and, if configured, the reachability probe.
    pub fn start_services(&self) -> BackgroundServices {
        let probe = self
            .config
            .probe()
            .map(|probe| self.connectivity.spawn_probe(probe));
        let sync = SyncService::start(
            self.queue.clone(),
            &self.connectivity,
            self.config.queue.retry,
        );
        BackgroundServices { sync, probe }
    }

    /// Begin recording `session_id` into its session log.
    pub fn recorder(&self, session_id: &str) -> SessionRecorder {
        let scrubber = self.config.sessions.scrub.then(ScrubConfig::default);
        SessionRecorder::start_with_scrubber(self.store.clone(), session_id, scrubber)
    }

    /// A replayer that prefers the history service and falls back to local logs.
    pub fn replayer(&self) -> SessionReplayer {
        let replayer = SessionReplayer::new().with_store(self.store.clone());
        match &self.history {
            Some(source) => replayer.with_history_source(source.clone()),
            None => replayer,
        }
    }

    pub fn web_state(&self) -> WebAppState {
        WebAppState::new(
            self.queue.clone(),
            self.connectivity.clone(),
            self.store.clone(),
        )
    }
}

fn build_executor(config: &Config) -> Arc<dyn RemoteExecutor> {
    let Some(endpoint) = &config.executor.endpoint else {
        tracing::debug!("No executor endpoint configured; actions stay queued");
        return Arc::new(UnconfiguredExecutor);
    };
    match HttpExecutor::new(endpoint.clone(), config.executor.timeout) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "Failed to build HTTP executor");
            Arc::new(UnconfiguredExecutor)
        }
    }
}

fn build_history_source(config: &Config) -> Option<Arc<dyn HistorySource>> {
    let base_url = config.history.base_url.as_ref()?;
    match HttpHistorySource::new(base_url.clone(), Duration::from_secs(10)) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            tracing::warn!(base_url = %base_url, error = %e, "Failed to build history client");
            None
        }
    }
}
