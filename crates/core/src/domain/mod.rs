// Domain Layer - Stores, schema records and transaction vocabulary

pub mod error;
pub mod fault;
pub mod schema;
pub mod store;
pub mod transaction;

// Re-exports
pub use error::DomainError;
pub use fault::DeviceFault;
pub use schema::{
    PreservedFields, SchemaRecord, Watermark, OUTBOUND_QUEUE_SCHEMA_VERSION,
    PRIMARY_DATA_SCHEMA_VERSION, SCHEMA_TABLE,
};
pub use store::Store;
pub use transaction::{TransactionHint, Warning};
