//! File logging initialization.

use std::fs::{self, OpenOptions};

use super::paths;

/// Initialize logging to file (~/.overtab/logs/overtab.log).
///
/// Honors `RUST_LOG` via the env filter; defaults to WARN.
pub fn init_file_logging() -> anyhow::Result<()> {
    fs::create_dir_all(paths::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    Ok(())
}
