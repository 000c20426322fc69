// SQLite Store Lifecycle
//
// Owns the process-wide database lock. Start, stop, reset, delete, compaction and
// every transaction run under it, so no two units of work ever touch the stores
// at the same time.

use crate::connection::ConnectionManager;
use crate::media;
use crate::schema::SchemaManager;
use crate::transaction::SqliteStoreTransaction;
use async_trait::async_trait;
use dockstore_core::domain::{
    DeviceFault, DomainError, PreservedFields, SchemaRecord, Store, TransactionHint,
};
use dockstore_core::error::{AppError, Result};
use dockstore_core::port::{FaultReporter, StoreLifecycle, TimeProvider};
use dockstore_core::StorageConfig;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct LifecycleState {
    started: HashSet<Store>,
    schemas: HashMap<Store, SchemaRecord>,
    start_errors: HashMap<Store, String>,
}

struct Inner {
    connections: ConnectionManager,
    lock: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<LifecycleState>,
    time_provider: Arc<dyn TimeProvider>,
    faults: Arc<dyn FaultReporter>,
}

/// Lifecycle and transaction entry point for both stores.
///
/// Cheap to clone; clones share the lock, the connections and the started set.
#[derive(Clone)]
pub struct SqliteLifecycle {
    inner: Arc<Inner>,
}

impl SqliteLifecycle {
    pub fn new(
        config: StorageConfig,
        time_provider: Arc<dyn TimeProvider>,
        faults: Arc<dyn FaultReporter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                connections: ConnectionManager::new(config),
                lock: Arc::new(tokio::sync::Mutex::new(())),
                state: Mutex::new(LifecycleState::default()),
                time_provider,
                faults,
            }),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        self.inner.connections.config()
    }

    pub(crate) fn connections(&self) -> &ConnectionManager {
        &self.inner.connections
    }

    fn state(&self) -> MutexGuard<'_, LifecycleState> {
        // Poison ignored: state updates are single inserts/removes
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for the database lock, bounded by the configured timeout
    pub(crate) async fn acquire_lock(&self, operation: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = Arc::clone(&self.inner.lock);
        match self.config().lock_timeout() {
            None => Ok(lock.lock_owned().await),
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    let waited_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(operation, waited_ms, "Timed out waiting for the database lock");
                    AppError::LockTimeout {
                        operation: operation.to_string(),
                        waited_ms,
                    }
                }),
        }
    }

    /// Open a unit of work on a started store.
    ///
    /// Waits for the database lock; the returned transaction holds it until
    /// dropped. Read-only transactions get a read-only connection and no
    /// BEGIN.
    pub async fn begin_transaction(
        &self,
        store: Store,
        read_only: bool,
        hint: TransactionHint,
    ) -> Result<SqliteStoreTransaction> {
        self.check_started(store)?;
        let guard = self.acquire_lock("transaction").await?;
        // Stopped or reset while we waited
        self.check_started(store)?;

        SqliteStoreTransaction::open(
            &self.inner.connections,
            store,
            read_only,
            hint,
            self.inner.time_provider.now_utc(),
            Some(guard),
        )
        .await
    }

    pub async fn begin_read(&self, store: Store) -> Result<SqliteStoreTransaction> {
        self.begin_transaction(store, true, TransactionHint::default())
            .await
    }

    pub async fn begin_write(&self, store: Store) -> Result<SqliteStoreTransaction> {
        self.begin_transaction(store, false, TransactionHint::default())
            .await
    }

    /// Transaction for the lifecycle's own use; the caller holds the lock
    async fn open_locked(&self, store: Store) -> Result<SqliteStoreTransaction> {
        SqliteStoreTransaction::open(
            &self.inner.connections,
            store,
            false,
            TransactionHint::default(),
            self.inner.time_provider.now_utc(),
            None,
        )
        .await
    }

    /// New connection to a started store, outside the database lock and the
    /// transaction pools.
    ///
    /// For diagnostics only; all data access goes through transactions.
    pub async fn get_connection(&self, store: Store, read_only: bool) -> Result<SqliteConnection> {
        self.check_started(store)?;
        self.inner.connections.connect(store, read_only).await
    }

    /// Start a store: restore it from its image when the file is missing,
    /// open it (rolling back any hot journal), verify the schema and reset
    /// the store when the version differs from the one this build expects.
    ///
    /// Failure raises a `DatabaseNotStarted` fault and leaves the store
    /// unusable until a later start or reset succeeds.
    pub async fn start(&self, store: Store) -> Result<SchemaRecord> {
        let _guard = self.acquire_lock("start").await?;
        info!(store = %store, "Starting store");
        let result = self.start_locked(store).await;
        self.record_outcome(store, "start", &result).await;
        result
    }

    async fn start_locked(&self, store: Store) -> Result<SchemaRecord> {
        let connections = &self.inner.connections;
        let path = connections.store_path(store);
        let journal = connections.journal_path(store);

        connections.close_store(store).await;

        if !media::exists(&path).await? {
            info!(store = %store, path = %path.display(), "Store file missing, restoring from image");
            media::restore_from_image(&connections.image_path(store), &path, &journal).await?;
        } else if media::exists(&journal).await? {
            warn!(store = %store, journal = %journal.display(), "Hot journal found, rolling back on open");
        }

        let mut tx = self.open_locked(store).await?;
        let schema = SchemaManager::read(&mut tx).await?;
        tx.commit().await?;
        drop(tx);

        if media::exists(&journal).await? {
            error!(store = %store, journal = %journal.display(), "Journal still present after open");
        }

        if SchemaManager::compatible(store, &schema) {
            return Ok(schema);
        }

        info!(
            store = %store,
            found = schema.version,
            expected = store.expected_schema_version(),
            "Resetting store to current schema"
        );
        self.reset_locked(store, &schema.preserved_fields()).await
    }

    /// Recreate a store from its pristine image, writing `preserved` into the
    /// fresh schema row. The store is started afterwards.
    pub async fn reset(&self, store: Store, preserved: PreservedFields) -> Result<SchemaRecord> {
        let _guard = self.acquire_lock("reset").await?;
        let result = self.reset_locked(store, &preserved).await;
        self.record_outcome(store, "reset", &result).await;
        result
    }

    /// Reset a store, carrying over whatever identity fields it currently holds
    pub async fn reset_preserving(&self, store: Store) -> Result<SchemaRecord> {
        let _guard = self.acquire_lock("reset").await?;
        let preserved = self.current_preserved_locked(store).await;
        let result = self.reset_locked(store, &preserved).await;
        self.record_outcome(store, "reset", &result).await;
        result
    }

    async fn current_preserved_locked(&self, store: Store) -> PreservedFields {
        if let Some(schema) = self.cached_schema(store) {
            return schema.preserved_fields();
        }
        match media::exists(&self.inner.connections.store_path(store)).await {
            Ok(true) => {}
            _ => return PreservedFields::default(),
        }
        let read = async {
            let mut tx = self.open_locked(store).await?;
            SchemaManager::read(&mut tx).await
        };
        match read.await {
            Ok(schema) => schema.preserved_fields(),
            Err(err) => {
                warn!(store = %store, error = %err, "Could not read fields to preserve");
                PreservedFields::default()
            }
        }
    }

    async fn reset_locked(&self, store: Store, preserved: &PreservedFields) -> Result<SchemaRecord> {
        let connections = &self.inner.connections;
        let path = connections.store_path(store);
        let journal = connections.journal_path(store);

        connections.close_store(store).await;
        media::delete_store_files(&path, &journal).await?;
        media::restore_from_image(&connections.image_path(store), &path, &journal).await?;

        let mut tx = self.open_locked(store).await?;
        let mut schema = SchemaManager::read(&mut tx).await?;
        if !schema.is_compatible_with(store) {
            return Err(DomainError::IncompatibleSchema {
                store,
                found: schema.version,
                expected: store.expected_schema_version(),
            }
            .into());
        }
        if store.carries_identity() {
            SchemaManager::write_preserved_fields(&mut tx, preserved).await?;
            schema.apply_preserved(preserved);
        }
        tx.commit().await?;

        info!(store = %store, version = schema.version, "Store reset from pristine image");
        Ok(schema)
    }

    async fn record_outcome(&self, store: Store, operation: &str, result: &Result<SchemaRecord>) {
        match result {
            Ok(schema) => {
                {
                    let mut state = self.state();
                    state.started.insert(store);
                    state.schemas.insert(store, schema.clone());
                    state.start_errors.remove(&store);
                }
                self.inner.faults.clear(store);
                info!(store = %store, version = schema.version, operation, "Store started");
            }
            Err(err) => {
                error!(store = %store, operation, error = %err, "Store failed to start");
                self.inner.connections.close_store(store).await;
                {
                    let mut state = self.state();
                    state.started.remove(&store);
                    state.schemas.remove(&store);
                    state.start_errors.insert(store, err.to_string());
                }
                self.inner.faults.raise(DeviceFault::DatabaseNotStarted {
                    store,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Close every connection and mark all stores not started. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let _guard = self.acquire_lock("stop").await?;
        self.inner.connections.close_all().await;
        let mut state = self.state();
        state.started.clear();
        state.schemas.clear();
        info!("Stores stopped");
        Ok(())
    }

    /// Delete a store's file and journal. The store must be started again.
    pub async fn delete(&self, store: Store) -> Result<()> {
        let _guard = self.acquire_lock("delete").await?;
        self.inner.connections.close_store(store).await;
        {
            let mut state = self.state();
            state.started.remove(&store);
            state.schemas.remove(&store);
        }
        let connections = &self.inner.connections;
        media::delete_store_files(&connections.store_path(store), &connections.journal_path(store))
            .await
    }

    pub fn check_started(&self, store: Store) -> Result<()> {
        if self.is_started(store) {
            Ok(())
        } else {
            debug!(store = %store, "Rejected access to store that is not started");
            Err(AppError::NotStarted(store))
        }
    }

    pub fn is_started(&self, store: Store) -> bool {
        self.state().started.contains(&store)
    }

    /// Schema row validated by the last successful start or reset
    pub fn cached_schema(&self, store: Store) -> Option<SchemaRecord> {
        self.state().schemas.get(&store).cloned()
    }

    /// Reason of the last failed start, cleared by a successful one
    pub fn last_start_error(&self, store: Store) -> Option<String> {
        self.state().start_errors.get(&store).cloned()
    }
}

#[async_trait]
impl StoreLifecycle for SqliteLifecycle {
    async fn start(&self, store: Store) -> Result<SchemaRecord> {
        SqliteLifecycle::start(self, store).await
    }

    async fn stop(&self) -> Result<()> {
        SqliteLifecycle::stop(self).await
    }

    async fn reset(&self, store: Store, preserved: PreservedFields) -> Result<SchemaRecord> {
        SqliteLifecycle::reset(self, store, preserved).await
    }

    fn check_started(&self, store: Store) -> Result<()> {
        SqliteLifecycle::check_started(self, store)
    }

    fn is_started(&self, store: Store) -> bool {
        SqliteLifecycle::is_started(self, store)
    }
}
