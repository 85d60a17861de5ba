//! Shared utilities: data directory paths, logging setup, timestamps.

pub mod clock;
pub mod logging;
pub mod paths;

pub use clock::TimestampSource;
pub use logging::init_file_logging;
pub use paths::{config_path, data_dir, database_path, init_data_dir, log_file_path, logs_dir};
