// Central Error Type for the Persistence Layer

use crate::domain::Store;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Lifecycle precondition violated; fatal until an explicit start or reset
    #[error("Store {0} is not started")]
    NotStarted(Store),

    /// Duplicate key on insert; callers branch on it for "insert, else update"
    #[error("Constraint violation: {message} [{sql}]")]
    ConstraintViolation { sql: String, message: String },

    #[error("Commit failed: {0}")]
    CommitFailure(String),

    #[error("Rollback failed: {0}")]
    RollbackFailure(String),

    /// Any other statement failure, with the offending SQL for diagnostics
    #[error("Data access failed: {cause} [{sql}]")]
    DataAccess { sql: String, cause: String },

    #[error("Column ordinal {ordinal} out of range ({len} columns)")]
    OrdinalOutOfRange { ordinal: usize, len: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Stored value cannot be decoded as the requested type (schema/code drift)
    #[error("Type mismatch at column {ordinal}: {message}")]
    TypeMismatch { ordinal: usize, message: String },

    #[error("Timed out after {waited_ms}ms waiting for the database lock ({operation})")]
    LockTimeout { operation: String, waited_ms: u64 },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, AppError::ConstraintViolation { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
