// Store Lifecycle Port

use crate::domain::{PreservedFields, SchemaRecord, Store};
use crate::error::Result;
use async_trait::async_trait;

/// Start/stop/reset control of the stores.
///
/// Implementations own the process-wide database lock; there is no other
/// entry point to the stores' lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreLifecycle: Send + Sync {
    /// Bring a store from unknown filesystem state to open and schema-verified
    ///
    /// # Returns
    /// The validated schema row
    async fn start(&self, store: Store) -> Result<SchemaRecord>;

    /// Close every connection of every store and mark them not started
    async fn stop(&self) -> Result<()>;

    /// Recreate the store from its pristine image, writing `preserved` back
    async fn reset(&self, store: Store, preserved: PreservedFields) -> Result<SchemaRecord>;

    /// Fast-fail guard: `NotStarted` unless the store was started successfully
    fn check_started(&self, store: Store) -> Result<()>;

    fn is_started(&self, store: Store) -> bool;
}
