// Dockstore Infrastructure - SQLite Adapter
// Implements: StoreLifecycle, StoreMaintenance, plus the transaction/codec contract
// every repository builds on

pub mod codec;
mod connection;
mod error;
mod lifecycle;
mod maintenance_impl;
mod media;
pub mod ordinal;
pub mod schema;
mod transaction;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{
    get_optional, is_null, safe_get, safe_get_date_time, to_parameter, ColumnValue,
    DateTimeKind, Parameter, SqlValue, ToSqlValue,
};
pub use connection::ConnectionManager;
pub use lifecycle::SqliteLifecycle;
pub use ordinal::OrdinalCache;
pub use schema::SchemaManager;
pub use transaction::{Command, SqliteStoreTransaction, Statement, UpsertOutcome};

// Repositories read rows through the codec; re-exported so they need no direct sqlx import
pub use sqlx::sqlite::SqliteRow;
