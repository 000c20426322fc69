// SQLite Transaction Implementation
//
// A unit of work against one store. Holds the process-wide database lock for its
// whole life; dropping it without commit rolls back and releases the lock.

use crate::codec::{bind_value, safe_get, to_parameter, ColumnValue, Parameter, ToSqlValue};
use crate::connection::ConnectionManager;
use crate::error::map_sqlx_error;
use chrono::{DateTime, Utc};
use dockstore_core::domain::{Store, TransactionHint, Warning};
use dockstore_core::error::{AppError, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::{Sqlite, SqliteConnection};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, warn};
use uuid::Uuid;

enum TxState {
    /// Read-only connection, no transaction opened
    ReadOnly(PoolConnection<Sqlite>),
    Active(sqlx::Transaction<'static, Sqlite>),
    Finished,
}

/// Result of an update-else-insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// SQL text plus parameters in placeholder order.
///
/// Placeholders are positional (`?`); the names given to `bind` label the
/// parameters in logs and errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Parameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind<T: ToSqlValue + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.params.push(to_parameter(name, value));
        self
    }

    pub fn bind_parameter(mut self, parameter: Parameter) -> Self {
        self.params.push(parameter);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }
}

pub struct SqliteStoreTransaction {
    id: Uuid,
    store: Store,
    hint: TransactionHint,
    timestamp: DateTime<Utc>,
    warnings: Vec<Warning>,
    // Declared before the lock so the rollback is queued before the lock is released
    state: TxState,
    _lock: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for SqliteStoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStoreTransaction")
            .field("id", &self.id)
            .field("store", &self.store)
            .field("read_only", &self.is_read_only())
            .field("finished", &self.is_finished())
            .field("timestamp", &self.timestamp)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl SqliteStoreTransaction {
    /// `lock` is `None` only for transactions opened by the lifecycle while it
    /// already holds the database lock
    pub(crate) async fn open(
        connections: &ConnectionManager,
        store: Store,
        read_only: bool,
        hint: TransactionHint,
        timestamp: DateTime<Utc>,
        lock: Option<OwnedMutexGuard<()>>,
    ) -> Result<Self> {
        let state = if read_only {
            TxState::ReadOnly(connections.acquire(store, true).await?)
        } else {
            TxState::Active(connections.begin(store).await?)
        };

        let id = Uuid::new_v4();
        debug!(tx_id = %id, store = %store, read_only, hint = ?hint, "Transaction opened");

        Ok(Self {
            id,
            store,
            hint,
            timestamp,
            warnings: Vec::new(),
            state,
            _lock: lock,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> Store {
        self.store
    }

    pub fn hint(&self) -> TransactionHint {
        self.hint
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.state, TxState::ReadOnly(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TxState::Finished)
    }

    /// Captured once at open; every row written in this unit of work shares it
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let warning = Warning::new(message);
        warn!(tx_id = %self.id, store = %self.store, warning = %warning, "Transaction warning");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Underlying connection, for statements the command API does not cover
    pub fn connection(&mut self) -> Result<&mut SqliteConnection> {
        match &mut self.state {
            TxState::ReadOnly(conn) => Ok(&mut **conn),
            TxState::Active(tx) => Ok(&mut **tx),
            TxState::Finished => Err(AppError::TransactionFinished),
        }
    }

    pub fn command(&mut self, sql: impl Into<String>) -> Command<'_> {
        self.prepare(Statement::new(sql))
    }

    pub fn prepare(&mut self, statement: Statement) -> Command<'_> {
        Command {
            tx: self,
            statement,
        }
    }

    async fn run(&mut self, statement: &Statement) -> Result<SqliteQueryResult> {
        debug!(tx_id = %self.id, sql = %statement.sql, params = ?statement.param_names(), "Execute");
        let id = self.id;
        let mut query = sqlx::query(statement.sql());
        for param in statement.params() {
            query = bind_value(query, &param.value);
        }
        query.execute(self.connection()?).await.map_err(|e| {
            let err = map_sqlx_error(e, statement.sql());
            if !err.is_constraint_violation() {
                error!(tx_id = %id, params = ?statement.params(), error = %err, "Statement failed");
            }
            err
        })
    }

    async fn fetch(&mut self, statement: &Statement) -> Result<Vec<SqliteRow>> {
        debug!(tx_id = %self.id, sql = %statement.sql, params = ?statement.param_names(), "Query");
        let id = self.id;
        let mut query = sqlx::query(statement.sql());
        for param in statement.params() {
            query = bind_value(query, &param.value);
        }
        query.fetch_all(self.connection()?).await.map_err(|e| {
            let err = map_sqlx_error(e, statement.sql());
            error!(tx_id = %id, params = ?statement.params(), error = %err, "Query failed");
            err
        })
    }

    /// Update the row, or insert it, in the order the transaction's hint asks for.
    ///
    /// With `LikelyInsert` the insert runs first and a duplicate key falls back
    /// to the update; otherwise the insert only runs when the update touched
    /// no row.
    pub async fn upsert(&mut self, update: &Statement, insert: &Statement) -> Result<UpsertOutcome> {
        match self.hint {
            TransactionHint::LikelyInsert => {
                if self.insert(insert).await? {
                    return Ok(UpsertOutcome::Inserted);
                }
                self.run(update).await?;
                Ok(UpsertOutcome::Updated)
            }
            TransactionHint::UpdateThenInsert => {
                if self.run(update).await?.rows_affected() > 0 {
                    return Ok(UpsertOutcome::Updated);
                }
                self.run(insert).await?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn insert(&mut self, statement: &Statement) -> Result<bool> {
        match self.run(statement).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_constraint_violation() => {
                debug!(tx_id = %self.id, sql = %statement.sql, "Insert hit duplicate key");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Commit the unit of work. A no-op for read-only or finished transactions.
    pub async fn commit(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Active(tx) => {
                tx.commit().await.map_err(|e| {
                    error!(tx_id = %self.id, store = %self.store, error = %e, "Commit failed");
                    AppError::CommitFailure(e.to_string())
                })?;
                debug!(tx_id = %self.id, warnings = self.warnings.len(), "Transaction committed");
                Ok(())
            }
            read_only @ TxState::ReadOnly(_) => {
                self.state = read_only;
                Ok(())
            }
            TxState::Finished => Ok(()),
        }
    }

    /// Discard the unit of work; further statements fail with `TransactionFinished`
    pub async fn rollback(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Active(tx) => {
                tx.rollback().await.map_err(|e| {
                    error!(tx_id = %self.id, store = %self.store, error = %e, "Rollback failed");
                    AppError::RollbackFailure(e.to_string())
                })?;
                debug!(tx_id = %self.id, "Transaction rolled back");
                Ok(())
            }
            TxState::ReadOnly(_) | TxState::Finished => Ok(()),
        }
    }
}

impl Drop for SqliteStoreTransaction {
    fn drop(&mut self) {
        if let TxState::Active(_) = self.state {
            debug!(tx_id = %self.id, store = %self.store, "Transaction dropped without commit, rolling back");
        }
    }
}

/// One statement bound to a transaction
pub struct Command<'t> {
    tx: &'t mut SqliteStoreTransaction,
    statement: Statement,
}

impl Command<'_> {
    pub fn bind<T: ToSqlValue + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.statement = self.statement.bind(name, value);
        self
    }

    pub fn bind_parameter(mut self, parameter: Parameter) -> Self {
        self.statement = self.statement.bind_parameter(parameter);
        self
    }

    /// Bind the transaction's timestamp
    pub fn bind_transaction_time(self, name: &str) -> Self {
        let timestamp = self.tx.timestamp;
        self.bind(name, &timestamp)
    }

    /// Run a non-query statement
    ///
    /// # Returns
    /// Rows affected
    pub async fn execute(self) -> Result<u64> {
        Ok(self.tx.run(&self.statement).await?.rows_affected())
    }

    /// Run an INSERT; `false` when it hit a duplicate key, so callers can fall
    /// back to an update. Other failures are errors.
    pub async fn insert(self) -> Result<bool> {
        self.tx.insert(&self.statement).await
    }

    pub async fn fetch_all(self) -> Result<Vec<SqliteRow>> {
        self.tx.fetch(&self.statement).await
    }

    pub async fn fetch_optional(self) -> Result<Option<SqliteRow>> {
        Ok(self.tx.fetch(&self.statement).await?.into_iter().next())
    }

    /// First column of the first row; `None` when there is no row
    pub async fn fetch_scalar<T: ColumnValue>(self) -> Result<Option<T>> {
        match self.fetch_optional().await? {
            Some(row) => safe_get::<T>(&row, 0).map(Some),
            None => Ok(None),
        }
    }
}
