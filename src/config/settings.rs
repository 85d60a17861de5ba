//! Engine configuration
//!
//! Every timing and limit constant the engine uses lives here. `Config` is
//! plain data injected at construction; nothing reads the override file
//! implicitly. The optional TOML file at `~/.overtab/config.toml` is parsed
//! into a partial `TomlConfig` and merged over the defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::util::paths::config_path;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key under which the tab envelope is stored in the shared store
    pub store_key: String,
    /// Coalescing window for debounced persistence
    pub debounce_window: Duration,
    /// Age after which an advisory operation lock is considered stale
    pub lock_timeout: Duration,
    /// Window during which repeated take_for_restore calls are idempotent
    pub restore_window: Duration,
    /// How long to wait for the renderer's clear_snapshot acknowledgment
    pub renderer_ack_timeout: Duration,
    /// Age after which a pending-clear snapshot is recovered
    pub snapshot_recovery_timeout: Duration,
    /// TTL for the notification dedup window
    pub dedup_ttl: Duration,
    /// Interval of the snapshot/visibility consistency check
    pub consistency_interval: Duration,
    /// Timeout applied to every single shared-store call
    pub store_timeout: Duration,
    /// Maximum attempts for one version-guarded write
    pub max_write_attempts: u32,
    /// Consecutive store timeouts before the write coordinator degrades
    pub degraded_threshold: u32,
    /// Z-order counter ceiling; exceeding it triggers recompaction
    pub z_index_ceiling: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_key: "overtab/tabs".to_string(),
            debounce_window: Duration::from_millis(200),
            lock_timeout: Duration::from_millis(1000),
            restore_window: Duration::from_millis(500),
            renderer_ack_timeout: Duration::from_millis(500),
            snapshot_recovery_timeout: Duration::from_secs(10),
            dedup_ttl: Duration::from_secs(30),
            consistency_interval: Duration::from_secs(5),
            store_timeout: Duration::from_secs(2),
            max_write_attempts: 3,
            degraded_threshold: 3,
            z_index_ceiling: 100_000,
        }
    }
}

/// Partial configuration as read from the TOML override file.
/// All durations are in milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub store_key: Option<String>,
    pub debounce_window_ms: Option<u64>,
    pub lock_timeout_ms: Option<u64>,
    pub restore_window_ms: Option<u64>,
    pub renderer_ack_timeout_ms: Option<u64>,
    pub snapshot_recovery_timeout_ms: Option<u64>,
    pub dedup_ttl_ms: Option<u64>,
    pub consistency_interval_ms: Option<u64>,
    pub store_timeout_ms: Option<u64>,
    pub max_write_attempts: Option<u32>,
    pub degraded_threshold: Option<u32>,
    pub z_index_ceiling: Option<u32>,
}

impl Config {
    /// Load configuration, merging `~/.overtab/config.toml` over the defaults
    /// if it exists. A malformed file is logged and ignored.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();
        if !path.exists() {
            return config;
        }

        let overrides = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                    return config;
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
                return config;
            }
        };

        config.apply(overrides);
        config
    }

    fn apply(&mut self, overrides: TomlConfig) {
        if let Some(key) = overrides.store_key {
            self.store_key = key;
        }
        if let Some(ms) = overrides.debounce_window_ms {
            self.debounce_window = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.lock_timeout_ms {
            self.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.restore_window_ms {
            self.restore_window = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.renderer_ack_timeout_ms {
            self.renderer_ack_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.snapshot_recovery_timeout_ms {
            self.snapshot_recovery_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.dedup_ttl_ms {
            self.dedup_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.consistency_interval_ms {
            self.consistency_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.store_timeout_ms {
            self.store_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = overrides.max_write_attempts {
            self.max_write_attempts = n.max(1);
        }
        if let Some(n) = overrides.degraded_threshold {
            self.degraded_threshold = n.max(1);
        }
        if let Some(n) = overrides.z_index_ceiling {
            self.z_index_ceiling = n;
        }
    }
}
