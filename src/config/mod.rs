mod settings;

pub use settings::{
    Config, ConnectivityConfig, ExecutorConfig, HistoryConfig, QueueConfig, ServerConfig,
    SessionsConfig, EXAMPLE_CONFIG,
};
