// SQLite Connection Management
//
// One single-connection pool per (store, read_only). Pools are created lazily on
// first use and closed explicitly by the lifecycle before any file operation.

use crate::error::map_sqlx_error;
use dockstore_core::domain::Store;
use dockstore_core::error::Result;
use dockstore_core::StorageConfig;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const JOURNAL_SUFFIX: &str = "-journal";

type PoolKey = (Store, bool);

/// Opens connections to the stores on the media.
///
/// Does not serialize anything by itself: callers that need exclusion go
/// through the lifecycle, which holds the database lock around every use.
pub struct ConnectionManager {
    config: StorageConfig,
    pools: Mutex<HashMap<PoolKey, SqlitePool>>,
}

impl ConnectionManager {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Live database file on the media
    pub fn store_path(&self, store: Store) -> PathBuf {
        self.config.media_dir.join(store.file_name())
    }

    /// Rollback journal next to the live file
    pub fn journal_path(&self, store: Store) -> PathBuf {
        let mut name: OsString = self.store_path(store).into_os_string();
        name.push(JOURNAL_SUFFIX);
        PathBuf::from(name)
    }

    /// Pristine image shipped with the firmware
    pub fn image_path(&self, store: Store) -> PathBuf {
        self.config.image_dir.join(store.file_name())
    }

    fn connect_options(&self, store: Store, read_only: bool) -> SqliteConnectOptions {
        // The file must already exist: creating it is restore-from-image's job.
        // Rollback journal, never WAL: the media may be pulled at any time.
        SqliteConnectOptions::new()
            .filename(self.store_path(store))
            .create_if_missing(false)
            .read_only(read_only)
            .journal_mode(SqliteJournalMode::Delete)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(self.config.busy_timeout())
    }

    fn pools(&self) -> MutexGuard<'_, HashMap<PoolKey, SqlitePool>> {
        // Poison ignored: the map is only inserted into or drained
        self.pools.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pool(&self, store: Store, read_only: bool) -> SqlitePool {
        self.pools()
            .entry((store, read_only))
            .or_insert_with(|| {
                debug!(store = %store, read_only, "Opening connection pool");
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(0)
                    .acquire_timeout(self.config.acquire_timeout())
                    .connect_lazy_with(self.connect_options(store, read_only))
            })
            .clone()
    }

    /// Plain connection, no transaction
    pub async fn acquire(&self, store: Store, read_only: bool) -> Result<PoolConnection<Sqlite>> {
        self.pool(store, read_only)
            .acquire()
            .await
            .map_err(|e| map_sqlx_error(e, "<connect>"))
    }

    /// Standalone connection outside the pools, owned and closed by the caller
    pub async fn connect(&self, store: Store, read_only: bool) -> Result<SqliteConnection> {
        debug!(store = %store, read_only, "Opening standalone connection");
        self.connect_options(store, read_only)
            .connect()
            .await
            .map_err(|e| map_sqlx_error(e, "<connect>"))
    }

    /// Write connection with an open transaction
    pub async fn begin(&self, store: Store) -> Result<sqlx::Transaction<'static, Sqlite>> {
        self.pool(store, false)
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, "BEGIN"))
    }

    /// Close both pools of a store, releasing its file handles
    pub async fn close_store(&self, store: Store) {
        let closing: Vec<SqlitePool> = {
            let mut pools = self.pools();
            [false, true]
                .into_iter()
                .filter_map(|read_only| pools.remove(&(store, read_only)))
                .collect()
        };
        for pool in closing {
            pool.close().await;
        }
        debug!(store = %store, "Connections closed");
    }

    pub async fn close_all(&self) {
        let closing: Vec<SqlitePool> = self.pools().drain().map(|(_, pool)| pool).collect();
        for pool in closing {
            pool.close().await;
        }
    }

    /// Number of pools currently open
    pub fn open_pools(&self) -> usize {
        self.pools().len()
    }
}
