//! Shared fixtures: a temporary media directory and pristine images of both stores
#![allow(dead_code)]

use dockstore_core::domain::{Store, Watermark};
use dockstore_core::port::time_provider::SystemTimeProvider;
use dockstore_core::port::{DeviceFaultFlags, TimeProvider};
use dockstore_core::StorageConfig;
use dockstore_infra_sqlite::SqliteLifecycle;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn image_ddl(store: Store, version: i64) -> Vec<String> {
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
                "CREATE TABLE CYLINDER (ID INTEGER PRIMARY KEY, PARTNUMBER TEXT NOT NULL UNIQUE, \
                 CAPACITY INTEGER, PRESSURE REAL, REFILLABLE INTEGER, EXPIRATIONDATE TEXT, \
                 SHELFLIFE INTEGER, NOTES TEXT, LABEL BLOB, RECUPDATETIMEUTC TEXT)"
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

/// Write a database with the layout of `store` at `version`
pub async fn build_image(path: &Path, store: Store, version: i64) {
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

/// Run raw SQL against a store file outside the lifecycle (simulates an older build)
pub async fn execute_raw(path: &Path, sql: &str) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::query(sql).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();
}

pub struct TestMedia {
    dir: TempDir,
    pub config: StorageConfig,
    pub faults: Arc<DeviceFaultFlags>,
}

impl TestMedia {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut StorageConfig)) -> Self {
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

        Self {
            dir,
            config,
            faults: Arc::new(DeviceFaultFlags::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn lifecycle(&self) -> SqliteLifecycle {
        self.lifecycle_with_time(Arc::new(SystemTimeProvider))
    }

    pub fn lifecycle_with_time(&self, time_provider: Arc<dyn TimeProvider>) -> SqliteLifecycle {
        SqliteLifecycle::new(self.config.clone(), time_provider, self.faults.clone()).unwrap()
    }

    pub fn store_path(&self, store: Store) -> PathBuf {
        self.config.media_dir.join(store.file_name())
    }

    pub fn journal_path(&self, store: Store) -> PathBuf {
        self.config
            .media_dir
            .join(format!("{}-journal", store.file_name()))
    }

    pub fn image_path(&self, store: Store) -> PathBuf {
        self.config.image_dir.join(store.file_name())
    }
}
