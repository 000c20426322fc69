// Store Maintenance Port
use crate::domain::Store;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Page accounting for one store file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreSizeInfo {
    pub page_size: i64,
    pub page_count: i64,
    pub freelist_count: i64,
}

impl StoreSizeInfo {
    /// Total size of the database in bytes
    pub fn total_bytes(&self) -> i64 {
        self.page_count * self.page_size
    }

    /// Bytes held by free pages (reclaimable by compaction)
    pub fn free_bytes(&self) -> i64 {
        self.freelist_count * self.page_size
    }
}

/// Administrative file operations on a store.
///
/// Every operation is serialized with all other database work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreMaintenance: Send + Sync {
    /// Run VACUUM to reclaim free pages
    ///
    /// # Returns
    /// Bytes reclaimed
    async fn compact(&self, store: Store) -> Result<u64>;

    /// Report total and free space of the store
    async fn size_info(&self, store: Store) -> Result<StoreSizeInfo>;

    /// Delete the store file and its journal; the store must be started again
    async fn delete(&self, store: Store) -> Result<()>;
}
