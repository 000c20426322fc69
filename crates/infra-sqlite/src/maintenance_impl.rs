// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use crate::lifecycle::SqliteLifecycle;
use async_trait::async_trait;
use dockstore_core::domain::Store;
use dockstore_core::error::Result;
use dockstore_core::port::{StoreMaintenance, StoreSizeInfo};
use sqlx::SqliteConnection;
use tracing::info;

async fn pragma(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let sql = format!("PRAGMA {}", name);
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(conn)
        .await
        .map_err(|e| map_sqlx_error(e, &sql))
}

async fn read_size_info(conn: &mut SqliteConnection) -> Result<StoreSizeInfo> {
    Ok(StoreSizeInfo {
        page_size: pragma(conn, "page_size").await?,
        page_count: pragma(conn, "page_count").await?,
        freelist_count: pragma(conn, "freelist_count").await?,
    })
}

#[async_trait]
impl StoreMaintenance for SqliteLifecycle {
    async fn compact(&self, store: Store) -> Result<u64> {
        let _guard = self.acquire_lock("compact").await?;
        self.check_started(store)?;

        // VACUUM cannot run inside a transaction: plain write connection
        let mut conn = self.connections().acquire(store, false).await?;
        let before = read_size_info(&mut conn).await?;

        info!(store = %store, size_bytes = before.total_bytes(), "Running VACUUM");
        sqlx::query("VACUUM")
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(e, "VACUUM"))?;

        let after = read_size_info(&mut conn).await?;
        let reclaimed = u64::try_from(before.total_bytes() - after.total_bytes()).unwrap_or(0);

        info!(
            store = %store,
            size_before_bytes = before.total_bytes(),
            size_after_bytes = after.total_bytes(),
            reclaimed_bytes = reclaimed,
            "VACUUM completed"
        );
        Ok(reclaimed)
    }

    async fn size_info(&self, store: Store) -> Result<StoreSizeInfo> {
        let _guard = self.acquire_lock("size_info").await?;
        self.check_started(store)?;
        let mut conn = self.connections().acquire(store, true).await?;
        read_size_info(&mut conn).await
    }

    async fn delete(&self, store: Store) -> Result<()> {
        SqliteLifecycle::delete(self, store).await
    }
}
