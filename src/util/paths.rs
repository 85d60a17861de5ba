//! Path utilities for Overtab data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Must be called early, before any other path functions are used.
/// If custom_path is None, uses the default ~/.overtab location.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    // Ignore error if already set (shouldn't happen in normal usage)
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

/// Get the default data directory path (~/.overtab)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".overtab"))
        .unwrap_or_else(|| PathBuf::from(".overtab"))
}

/// Get the base Overtab data directory.
/// Returns the custom path if set via init_data_dir(), otherwise ~/.overtab
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Get the shared-store database file path (~/.overtab/overtab.db)
pub fn database_path() -> PathBuf {
    data_dir().join("overtab.db")
}

/// Get the logs directory (~/.overtab/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Get the default log file path (~/.overtab/logs/overtab.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("overtab.log")
}

/// Get the configuration file path (~/.overtab/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}
