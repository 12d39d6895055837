//! Utility modules

pub mod paths;
pub mod time;

pub use paths::{
    config_path, data_dir, database_path, init_data_dir, log_file_path, logs_dir, tapes_dir,
};
pub use time::now_ms;
