use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::connectivity::ProbeConfig;
use crate::eventlog::CompactionPolicy;
use crate::queue::RetryPolicy;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub history: HistoryConfig,
    pub queue: QueueConfig,
    pub sessions: SessionsConfig,
    pub connectivity: ConnectivityConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Where queued actions are delivered (None = actions stay queued)
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub max_len: usize,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionsConfig {
    pub max_events: usize,
    pub scrub: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityConfig {
    /// Enables the polling probe when set
    pub probe_addr: Option<String>,
    pub probe_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig {
                endpoint: None,
                timeout: Duration::from_secs(10),
            },
            history: HistoryConfig::default(),
            queue: QueueConfig {
                max_len: 1000,
                retry: RetryPolicy::default(),
            },
            sessions: SessionsConfig {
                max_events: 5000,
                scrub: true,
            },
            connectivity: ConnectivityConfig::default(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3080,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlExecutorConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlHistoryConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlQueueConfig {
    pub max_len: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub retry_max_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlSessionsConfig {
    pub max_events: Option<usize>,
    pub scrub: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConnectivityConfig {
    pub probe_addr: Option<String>,
    pub probe_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub executor: Option<TomlExecutorConfig>,
    pub history: Option<TomlHistoryConfig>,
    pub queue: Option<TomlQueueConfig>,
    pub sessions: Option<TomlSessionsConfig>,
    pub connectivity: Option<TomlConnectivityConfig>,
    pub server: Option<TomlServerConfig>,
}

impl Config {
    /// Load configuration from the default file, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from `path`; unreadable or invalid files yield defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Config::default(),
        };
        match Self::from_toml_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                Config::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config = toml::from_str::<TomlConfig>(contents)?;
        let mut config = Config::default();
        config.merge(toml_config);
        Ok(config)
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(executor) = toml_config.executor {
            if executor.endpoint.is_some() {
                self.executor.endpoint = executor.endpoint;
            }
            if let Some(secs) = executor.timeout_secs {
                self.executor.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(history) = toml_config.history {
            if history.base_url.is_some() {
                self.history.base_url = history.base_url;
            }
        }

        if let Some(queue) = toml_config.queue {
            if let Some(max_len) = queue.max_len {
                self.queue.max_len = max_len;
            }
            let base = queue
                .retry_base_ms
                .map(Duration::from_millis)
                .unwrap_or(self.queue.retry.base);
            let max = queue
                .retry_max_ms
                .map(Duration::from_millis)
                .unwrap_or(self.queue.retry.max);
            self.queue.retry = RetryPolicy::new(base, max);
        }

        if let Some(sessions) = toml_config.sessions {
            if let Some(max_events) = sessions.max_events {
                self.sessions.max_events = max_events;
            }
            if let Some(scrub) = sessions.scrub {
                self.sessions.scrub = scrub;
            }
        }

        if let Some(connectivity) = toml_config.connectivity {
            if connectivity.probe_addr.is_some() {
                self.connectivity.probe_addr = connectivity.probe_addr;
            }
            match connectivity.probe_interval_secs {
                Some(0) => {
                    tracing::warn!("Ignoring probe_interval_secs = 0; using the default interval");
                }
                Some(secs) => self.connectivity.probe_interval = Some(Duration::from_secs(secs)),
                None => {}
            }
        }

        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(error = %e, "Failed to create config directory");
                return;
            }
        }
        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn compaction_policy(&self) -> CompactionPolicy {
        CompactionPolicy {
            max_session_events: Some(self.sessions.max_events),
            max_queue_len: Some(self.queue.max_len),
        }
    }

    /// Probe settings, if a probe address is configured
    pub fn probe(&self) -> Option<ProbeConfig> {
        let addr = self.connectivity.probe_addr.clone()?;
        let defaults = ProbeConfig::default();
        Some(ProbeConfig {
            addr,
            interval: self
                .connectivity
                .probe_interval
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.interval),
            timeout: defaults.timeout,
        })
    }
}
