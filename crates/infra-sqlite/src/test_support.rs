// Fixtures shared by the unit tests of this crate

use crate::codec::safe_get;
use crate::connection::ConnectionManager;
use crate::lifecycle::SqliteLifecycle;
use dockstore_core::domain::{Store, Watermark};
use dockstore_core::port::time_provider::SystemTimeProvider;
use dockstore_core::port::DeviceFaultFlags;
use dockstore_core::StorageConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// DDL of a pristine image at `version`
pub(crate) fn image_ddl(store: Store, version: i64) -> Vec<String> {
    match store {
        Store::PrimaryData => {
            let watermarks: String = Watermark::available_in(version)
                .map(|w| format!(", {} TEXT", w.column()))
                .collect();
            vec![
                format!(
                    "CREATE TABLE SCHEMA (VERSION INTEGER NOT NULL, ACCOUNTNUM TEXT, \
                     ACTIVATED INTEGER, ISMANUFACTURING INTEGER, SERVICECODE TEXT{})",
                    watermarks
                ),
                format!("INSERT INTO SCHEMA (VERSION) VALUES ({})", version),
                "CREATE TABLE READING (ID INTEGER PRIMARY KEY, NAME TEXT NOT NULL UNIQUE, \
                 VALUE INTEGER, RECUPDATETIMEUTC TEXT)"
                    .to_string(),
            ]
        }
        Store::OutboundQueue => vec![
            "CREATE TABLE SCHEMA (VERSION INTEGER NOT NULL)".to_string(),
            format!("INSERT INTO SCHEMA (VERSION) VALUES ({})", version),
            "CREATE TABLE QUEUE (ID INTEGER PRIMARY KEY AUTOINCREMENT, BODY TEXT NOT NULL, \
             TIMESTAMPUTC TEXT)"
                .to_string(),
        ],
    }
}

/// Write a database file with the image layout of `store` at `version`
pub(crate) async fn build_image(path: &Path, store: Store, version: i64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for ddl in image_ddl(store, version) {
        sqlx::query(&ddl).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
}

/// Names in the READING table, read through the write connection
pub(crate) async fn reading_names(connections: &ConnectionManager) -> Vec<String> {
    let mut conn = connections.acquire(Store::PrimaryData, false).await.unwrap();
    sqlx::query("SELECT NAME FROM READING ORDER BY NAME")
        .fetch_all(&mut *conn)
        .await
        .unwrap()
        .iter()
        .map(|row| safe_get::<String>(row, 0).unwrap())
        .collect()
}

/// Media and image directories with pristine images of both stores
pub(crate) struct TestStores {
    _dir: TempDir,
    pub config: StorageConfig,
    pub faults: Arc<DeviceFaultFlags>,
    pub lifecycle: SqliteLifecycle,
}

impl TestStores {
    pub(crate) async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub(crate) async fn with_config(adjust: impl FnOnce(&mut StorageConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config =
            StorageConfig::for_dirs(dir.path().join("media"), dir.path().join("images"));
        adjust(&mut config);

        for store in Store::ALL {
            build_image(
                &config.image_dir.join(store.file_name()),
                store,
                store.expected_schema_version(),
            )
            .await;
        }
        std::fs::create_dir_all(&config.media_dir).unwrap();

        let faults = Arc::new(DeviceFaultFlags::new());
        let lifecycle =
            SqliteLifecycle::new(config.clone(), Arc::new(SystemTimeProvider), faults.clone())
                .unwrap();

        Self {
            _dir: dir,
            config,
            faults,
            lifecycle,
        }
    }

    pub(crate) fn store_path(&self, store: Store) -> PathBuf {
        self.config.media_dir.join(store.file_name())
    }

    pub(crate) fn image_path(&self, store: Store) -> PathBuf {
        self.config.image_dir.join(store.file_name())
    }
}
