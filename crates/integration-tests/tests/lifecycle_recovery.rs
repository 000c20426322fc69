//! Lifecycle recovery tests
//!
//! Start must bring a store from whatever the media holds (nothing, a stale
//! journal, an interrupted write, an old schema, garbage) to a usable state or
//! to a clearly reported fault.

mod common;

use chrono::{TimeZone, Utc};
use common::{build_image, execute_raw, TestMedia};
use dockstore_core::domain::{PreservedFields, Store, Watermark, PRIMARY_DATA_SCHEMA_VERSION};
use dockstore_core::error::AppError;
use dockstore_core::port::FaultReporter;
use dockstore_infra_sqlite::{safe_get, SchemaManager, SqliteLifecycle};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};

async fn part_numbers(lifecycle: &SqliteLifecycle) -> Vec<String> {
    let mut tx = lifecycle.begin_read(Store::PrimaryData).await.unwrap();
    tx.command("SELECT PARTNUMBER FROM CYLINDER ORDER BY PARTNUMBER")
        .fetch_all()
        .await
        .unwrap()
        .iter()
        .map(|row| safe_get::<String>(row, 0).unwrap())
        .collect()
}

async fn add_cylinders(lifecycle: &SqliteLifecycle, part_numbers: &[String]) {
    let mut tx = lifecycle.begin_write(Store::PrimaryData).await.unwrap();
    for part_number in part_numbers {
        tx.command("INSERT INTO CYLINDER (PARTNUMBER, NOTES) VALUES (?, ?)")
            .bind("PARTNUMBER", part_number)
            .bind("NOTES", &"n".repeat(2048))
            .execute()
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();
}

/// Fresh media: the store is restored from its image byte for byte
#[tokio::test]
async fn test_first_start_restores_pristine_image() {
    let media = TestMedia::new().await;
    let lifecycle = media.lifecycle();

    for store in Store::ALL {
        let schema = lifecycle.start(store).await.unwrap();
        assert_eq!(schema.version, store.expected_schema_version());
        assert_eq!(
            std::fs::read(media.store_path(store)).unwrap(),
            std::fs::read(media.image_path(store)).unwrap()
        );
        assert!(!media.journal_path(store).exists());
    }
    assert!(media.faults.active().is_empty());
}

/// A journal left behind by a removed store must not be replayed into the image
#[tokio::test]
async fn test_stale_journal_is_deleted_before_restore() {
    let media = TestMedia::new().await;
    std::fs::write(media.journal_path(Store::PrimaryData), vec![0xAB; 4096]).unwrap();

    media.lifecycle().start(Store::PrimaryData).await.unwrap();

    assert!(!media.journal_path(Store::PrimaryData).exists());
    assert_eq!(
        std::fs::read(media.store_path(Store::PrimaryData)).unwrap(),
        std::fs::read(media.image_path(Store::PrimaryData)).unwrap()
    );
}

/// Power loss mid-transaction: the next start rolls the hot journal back
#[tokio::test]
async fn test_interrupted_write_is_rolled_back_on_start() {
    let media = TestMedia::new().await;
    let lifecycle = media.lifecycle();
    lifecycle.start(Store::PrimaryData).await.unwrap();
    let committed: Vec<String> = (0..40).map(|i| format!("COMMITTED-{:02}", i)).collect();
    add_cylinders(&lifecycle, &committed).await;
    lifecycle.stop().await.unwrap();
    let committed_bytes = std::fs::read(media.store_path(Store::PrimaryData)).unwrap();

    // A tiny page cache forces the writer to spill changed pages into the
    // database file before commit, leaving a hot journal behind
    let options = SqliteConnectOptions::new()
        .filename(media.store_path(Store::PrimaryData))
        .journal_mode(SqliteJournalMode::Delete)
        .pragma("cache_size", "1");
    let mut writer = SqliteConnection::connect_with(&options).await.unwrap();
    let mut in_flight = writer.begin().await.unwrap();
    sqlx::query("UPDATE CYLINDER SET NOTES = ?")
        .bind("x".repeat(3000))
        .execute(&mut *in_flight)
        .await
        .unwrap();
    for i in 0..200 {
        sqlx::query("INSERT INTO CYLINDER (PARTNUMBER, NOTES) VALUES (?, ?)")
            .bind(format!("PENDING-{:03}", i))
            .bind("p".repeat(2048))
            .execute(&mut *in_flight)
            .await
            .unwrap();
    }

    // Snapshot the media as it would be found after the power came back
    let crashed = TestMedia::new().await;
    std::fs::copy(
        media.store_path(Store::PrimaryData),
        crashed.store_path(Store::PrimaryData),
    )
    .unwrap();
    std::fs::copy(
        media.journal_path(Store::PrimaryData),
        crashed.journal_path(Store::PrimaryData),
    )
    .unwrap();
    in_flight.rollback().await.unwrap();
    writer.close().await.unwrap();

    assert_ne!(
        std::fs::read(crashed.store_path(Store::PrimaryData)).unwrap(),
        committed_bytes,
        "uncommitted pages never reached the database file"
    );

    let recovered = crashed.lifecycle();
    recovered.start(Store::PrimaryData).await.unwrap();

    assert!(!crashed.journal_path(Store::PrimaryData).exists());
    assert_eq!(part_numbers(&recovered).await, committed);
    let mut tx = recovered.begin_read(Store::PrimaryData).await.unwrap();
    let untouched = tx
        .command("SELECT COUNT(*) FROM CYLINDER WHERE LENGTH(NOTES) = 2048")
        .fetch_scalar::<i64>()
        .await
        .unwrap();
    assert_eq!(untouched, Some(40));
}

/// An empty journal is not hot and must not prevent startup
#[tokio::test]
async fn test_empty_journal_does_not_block_start() {
    let media = TestMedia::new().await;
    let lifecycle = media.lifecycle();
    lifecycle.start(Store::OutboundQueue).await.unwrap();
    lifecycle.stop().await.unwrap();

    std::fs::write(media.journal_path(Store::OutboundQueue), b"").unwrap();

    lifecycle.start(Store::OutboundQueue).await.unwrap();
    assert!(lifecycle.is_started(Store::OutboundQueue));
}

/// Older schema: the store is rebuilt, identity survives, data does not
#[tokio::test]
async fn test_old_schema_is_reset_and_identity_preserved() {
    let media = TestMedia::new().await;
    let live = media.store_path(Store::PrimaryData);
    build_image(&live, Store::PrimaryData, 9).await;
    execute_raw(
        &live,
        "UPDATE SCHEMA SET ACCOUNTNUM = 'ACC-9', ISMANUFACTURING = 1, SERVICECODE = 'SVC-9', \
         SETTINGSVERSION = '2020-01-01 00:00:00'",
    )
    .await;
    execute_raw(&live, "INSERT INTO CYLINDER (PARTNUMBER) VALUES ('OLD')").await;

    let lifecycle = media.lifecycle();
    let schema = lifecycle.start(Store::PrimaryData).await.unwrap();

    assert_eq!(schema.version, PRIMARY_DATA_SCHEMA_VERSION);
    assert_eq!(
        schema.preserved_fields(),
        PreservedFields {
            account_num: Some("ACC-9".to_string()),
            activated: None,
            is_manufacturing: Some(true),
            service_code: Some("SVC-9".to_string()),
        }
    );
    // Watermarks are not carried: the data they describe is gone
    assert!(schema.watermarks.is_empty());
    assert!(part_numbers(&lifecycle).await.is_empty());

    let mut tx = lifecycle.begin_read(Store::PrimaryData).await.unwrap();
    assert_eq!(SchemaManager::read(&mut tx).await.unwrap(), schema);
}

/// A schema newer than the code is just as incompatible as an older one
#[tokio::test]
async fn test_newer_schema_is_reset() {
    let media = TestMedia::new().await;
    build_image(
        &media.store_path(Store::OutboundQueue),
        Store::OutboundQueue,
        Store::OutboundQueue.expected_schema_version() + 1,
    )
    .await;

    let schema = media.lifecycle().start(Store::OutboundQueue).await.unwrap();

    assert_eq!(schema.version, Store::OutboundQueue.expected_schema_version());
}

/// Garbage on the media: start fails, the fault is raised, access is refused
/// until a reset, and the other store is unaffected
#[tokio::test]
async fn test_failed_start_keeps_store_down_until_reset() {
    let media = TestMedia::new().await;
    std::fs::write(
        media.store_path(Store::PrimaryData),
        vec![0x5A; 8192],
    )
    .unwrap();
    let lifecycle = media.lifecycle();

    assert!(lifecycle.start(Store::PrimaryData).await.is_err());
    lifecycle.start(Store::OutboundQueue).await.unwrap();

    assert!(matches!(
        lifecycle.begin_write(Store::PrimaryData).await,
        Err(AppError::NotStarted(Store::PrimaryData))
    ));
    assert!(lifecycle.begin_write(Store::OutboundQueue).await.is_ok());
    assert!(lifecycle.last_start_error(Store::PrimaryData).is_some());
    let faults = media.faults.active();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].store(), Store::PrimaryData);

    lifecycle.reset_preserving(Store::PrimaryData).await.unwrap();

    assert!(lifecycle.is_started(Store::PrimaryData));
    assert!(media.faults.active().is_empty());
    assert!(part_numbers(&lifecycle).await.is_empty());
}

/// Watermarks written through the schema manager survive a restart
#[tokio::test]
async fn test_watermarks_survive_restart() {
    let media = TestMedia::new().await;
    let lifecycle = media.lifecycle();
    lifecycle.start(Store::PrimaryData).await.unwrap();
    let cylinders = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
    let equipment = Utc.with_ymd_and_hms(2024, 5, 2, 7, 30, 0).unwrap();

    let mut tx = lifecycle.begin_write(Store::PrimaryData).await.unwrap();
    SchemaManager::update_cylinders_version(&mut tx, cylinders)
        .await
        .unwrap();
    SchemaManager::update_equipment_version(&mut tx, equipment)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    drop(tx);

    lifecycle.stop().await.unwrap();
    let schema = lifecycle.start(Store::PrimaryData).await.unwrap();

    assert_eq!(schema.watermark(Watermark::Cylinders), Some(cylinders));
    assert_eq!(schema.watermark(Watermark::Equipment), Some(equipment));
    assert_eq!(schema.watermark(Watermark::Schedules), None);
    assert_eq!(lifecycle.cached_schema(Store::PrimaryData), Some(schema));
}
