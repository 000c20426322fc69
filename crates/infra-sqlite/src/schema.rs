// Schema Manager
//
// Reads and writes the single-row SCHEMA table. Columns are selected by the
// version found in the row, so a store written by an older build can still be
// read far enough to decide whether it must be reset.

use crate::codec::get_optional;
use crate::codec::safe_get;
use crate::ordinal::OrdinalCache;
use crate::transaction::SqliteStoreTransaction;
use chrono::{DateTime, Utc};
use dockstore_core::domain::schema::columns;
use dockstore_core::domain::{
    DomainError, PreservedFields, SchemaRecord, Store, Watermark, SCHEMA_TABLE,
};
use dockstore_core::error::{AppError, Result};
use tracing::{debug, warn};

/// Restricts a write to the row `read` uses
const FIRST_ROW: &str = "WHERE ROWID = (SELECT MIN(ROWID) FROM SCHEMA)";

const IDENTITY_COLUMNS: [&str; 4] = [
    columns::ACCOUNT_NUM,
    columns::ACTIVATED,
    columns::IS_MANUFACTURING,
    columns::SERVICE_CODE,
];

pub struct SchemaManager;

impl SchemaManager {
    /// Read the schema row of the transaction's store.
    ///
    /// An empty table is an error. More than one row is tolerated: the first
    /// by ROWID is used and a warning is attached to the transaction.
    pub async fn read(tx: &mut SqliteStoreTransaction) -> Result<SchemaRecord> {
        let store = tx.store();
        let rows = tx
            .command(format!(
                "SELECT ROWID, {} FROM {} ORDER BY ROWID",
                columns::VERSION,
                SCHEMA_TABLE
            ))
            .fetch_all()
            .await?;

        let Some(first) = rows.first() else {
            return Err(AppError::Schema(format!(
                "{} table of store {} is empty",
                SCHEMA_TABLE, store
            )));
        };
        let rowid: i64 = safe_get(first, 0)?;
        let version: i64 = safe_get(first, 1)?;

        if rows.len() > 1 {
            tx.add_warning(format!(
                "{} table of store {} has {} rows; using ROWID {}",
                SCHEMA_TABLE,
                store,
                rows.len(),
                rowid
            ));
        }

        let watermarks: Vec<Watermark> = if store.tracks_watermarks() {
            Watermark::available_in(version).collect()
        } else {
            Vec::new()
        };

        let mut selected = vec![columns::VERSION];
        if store.carries_identity() {
            selected.extend(IDENTITY_COLUMNS);
        }
        selected.extend(watermarks.iter().map(|w| w.column()));

        let row = tx
            .command(format!(
                "SELECT {} FROM {} WHERE ROWID = ?",
                selected.join(", "),
                SCHEMA_TABLE
            ))
            .bind("ROWID", &rowid)
            .fetch_optional()
            .await?
            .ok_or_else(|| {
                AppError::Schema(format!("{} row {} of store {} vanished", SCHEMA_TABLE, rowid, store))
            })?;

        let ordinals = OrdinalCache::from_row(&row);
        let mut record = SchemaRecord::new(version);

        if store.carries_identity() {
            record.account_num = get_optional(&row, ordinals.ordinal(columns::ACCOUNT_NUM)?)?;
            record.activated = get_optional(&row, ordinals.ordinal(columns::ACTIVATED)?)?;
            record.is_manufacturing =
                get_optional(&row, ordinals.ordinal(columns::IS_MANUFACTURING)?)?;
            record.service_code = get_optional(&row, ordinals.ordinal(columns::SERVICE_CODE)?)?;
        }

        for watermark in watermarks {
            let ordinal = ordinals.ordinal(watermark.column())?;
            if let Some(value) = get_optional::<DateTime<Utc>>(&row, ordinal)? {
                record.watermarks.insert(watermark, value);
            }
        }

        debug!(store = %store, version, "Schema read");
        Ok(record)
    }

    /// Whether the running code can use `schema` as is
    pub fn compatible(store: Store, schema: &SchemaRecord) -> bool {
        let compatible = schema.is_compatible_with(store);
        if !compatible {
            warn!(
                store = %store,
                found = schema.version,
                expected = store.expected_schema_version(),
                "Schema version mismatch"
            );
        }
        compatible
    }

    /// Write the identity fields carried across a reset
    pub async fn write_preserved_fields(
        tx: &mut SqliteStoreTransaction,
        fields: &PreservedFields,
    ) -> Result<()> {
        let store = tx.store();
        if !store.carries_identity() {
            return Err(AppError::Schema(format!(
                "store {} has no identity columns",
                store
            )));
        }

        let updated = tx
            .command(format!(
                "UPDATE {} SET {} = ?, {} = ?, {} = ?, {} = ? {}",
                SCHEMA_TABLE,
                columns::ACCOUNT_NUM,
                columns::ACTIVATED,
                columns::IS_MANUFACTURING,
                columns::SERVICE_CODE,
                FIRST_ROW
            ))
            .bind(columns::ACCOUNT_NUM, &fields.account_num)
            .bind(columns::ACTIVATED, &fields.activated)
            .bind(columns::IS_MANUFACTURING, &fields.is_manufacturing)
            .bind(columns::SERVICE_CODE, &fields.service_code)
            .execute()
            .await?;
        ensure_row_updated(store, updated)
    }

    /// Set a sync watermark. Only stores that track watermarks accept this.
    pub async fn update_watermark(
        tx: &mut SqliteStoreTransaction,
        watermark: Watermark,
        value: DateTime<Utc>,
    ) -> Result<()> {
        let store = tx.store();
        if !store.tracks_watermarks() {
            return Err(DomainError::WatermarksUnsupported(store).into());
        }

        let updated = tx
            .command(format!(
                "UPDATE {} SET {} = ? {}",
                SCHEMA_TABLE,
                watermark.column(),
                FIRST_ROW
            ))
            .bind(watermark.column(), &value)
            .execute()
            .await?;
        ensure_row_updated(store, updated)?;
        debug!(store = %store, watermark = %watermark, value = %value, "Watermark updated");
        Ok(())
    }

    pub async fn update_cylinders_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::Cylinders, value).await
    }

    pub async fn update_schedules_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::Schedules, value).await
    }

    pub async fn update_event_journals_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::EventJournals, value).await
    }

    pub async fn update_settings_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::Settings, value).await
    }

    pub async fn update_equipment_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::Equipment, value).await
    }

    pub async fn update_critical_errors_version(
        tx: &mut SqliteStoreTransaction,
        value: DateTime<Utc>,
    ) -> Result<()> {
        Self::update_watermark(tx, Watermark::CriticalErrors, value).await
    }
}

fn ensure_row_updated(store: Store, updated: u64) -> Result<()> {
    if updated == 0 {
        return Err(AppError::Schema(format!(
            "{} table of store {} is empty",
            SCHEMA_TABLE, store
        )));
    }
    Ok(())
}
