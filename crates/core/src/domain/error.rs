// Domain Error Types

use crate::domain::Store;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    #[error("Schema version {found} of {store} is incompatible (expected {expected})")]
    IncompatibleSchema {
        store: Store,
        found: i64,
        expected: i64,
    },

    #[error("Watermarks are not tracked by {0}")]
    WatermarksUnsupported(Store),
}

pub type Result<T> = std::result::Result<T, DomainError>;
