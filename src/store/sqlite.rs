//! SQLite-backed shared store
//!
//! Production-shaped backend for contexts co-located on one machine. The
//! version check runs inside an immediate transaction, which is what makes
//! concurrent writers from separate connections safe. Change notifications
//! use the same in-process broadcast channel as the memory store; contexts
//! in other processes rely on `force_resync` to catch up.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::model::{TabEntity, WriteEnvelope};
use crate::util::paths;

use super::shared::{BackendError, SharedStore, StoreNotification, StoreRecord};

const NOTIFY_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum SqliteStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create data directory: {0}")]
    CreateDir(std::io::Error),
}

/// A database migration with a version number, name, and SQL to execute.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_envelopes_table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS envelopes (
                key TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                writer_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                tabs TEXT NOT NULL
            );
        "#,
    },
];

fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;

    for migration in MIGRATIONS {
        let applied: bool = conn
            .prepare("SELECT 1 FROM schema_migrations WHERE version = ?1")?
            .exists(params![migration.version])?;
        if applied {
            continue;
        }
        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.name,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
    }
    Ok(())
}

/// SQLite-backed shared store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    notify: broadcast::Sender<StoreNotification>,
    /// Path to the database file
    pub path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store database at the specified path.
    pub fn open(path: PathBuf) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SqliteStoreError::CreateDir)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 1000;")?;
        run_migrations(&conn)?;

        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notify,
            path,
        })
    }

    /// Open the store in the default location (~/.overtab/overtab.db).
    pub fn open_default() -> Result<Self, SqliteStoreError> {
        Self::open(paths::database_path())
    }

    fn read_record(conn: &Connection, key: &str) -> Result<StoreRecord, BackendError> {
        let mut stmt = conn
            .prepare("SELECT version, tabs FROM envelopes WHERE key = ?1")
            .map_err(|e| BackendError::Storage(e.to_string()))?;
        let mut rows = stmt
            .query(params![key])
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        match rows.next().map_err(|e| BackendError::Storage(e.to_string()))? {
            Some(row) => {
                let version: i64 = row
                    .get(0)
                    .map_err(|e| BackendError::Storage(e.to_string()))?;
                let tabs_json: String = row
                    .get(1)
                    .map_err(|e| BackendError::Storage(e.to_string()))?;
                let tabs: Vec<TabEntity> = serde_json::from_str(&tabs_json)?;
                Ok(StoreRecord {
                    tabs,
                    version: version as u64,
                })
            }
            None => Ok(StoreRecord::default()),
        }
    }
}

#[async_trait]
impl SharedStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<StoreRecord, BackendError> {
        let conn = self.conn.lock();
        Self::read_record(&conn, key)
    }

    async fn put(&self, key: &str, envelope: WriteEnvelope) -> Result<u64, BackendError> {
        let version = {
            let conn = self.conn.lock();
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| BackendError::Storage(e.to_string()))?;

            let current = match Self::read_record(&conn, key) {
                Ok(record) => record.version,
                Err(e) => {
                    rollback(&conn);
                    return Err(e);
                }
            };
            if envelope.version != current + 1 {
                rollback(&conn);
                return Err(BackendError::VersionConflict {
                    attempted: envelope.version,
                    current,
                });
            }

            let tabs_json = serde_json::to_string(&envelope.tabs)?;
            let result = conn.execute(
                "INSERT INTO envelopes (key, version, writer_id, timestamp, tabs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                   version = excluded.version,
                   writer_id = excluded.writer_id,
                   timestamp = excluded.timestamp,
                   tabs = excluded.tabs",
                params![
                    key,
                    envelope.version as i64,
                    envelope.writer_id,
                    envelope.timestamp.to_rfc3339(),
                    tabs_json,
                ],
            );
            if let Err(e) = result {
                rollback(&conn);
                return Err(BackendError::Storage(e.to_string()));
            }
            conn.execute_batch("COMMIT")
                .map_err(|e| BackendError::Storage(e.to_string()))?;
            envelope.version
        };

        let _ = self.notify.send(StoreNotification { envelope });
        Ok(version)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.notify.subscribe()
    }
}

fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        warn!(error = %e, "Failed to rollback envelope transaction");
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}
