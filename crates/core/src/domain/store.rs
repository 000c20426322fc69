// Store Domain Model

use crate::domain::error::DomainError;
use crate::domain::schema::{OUTBOUND_QUEUE_SCHEMA_VERSION, PRIMARY_DATA_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the two logical databases kept on the removable media.
///
/// Each store is backed by its own file and is started, reset and compacted
/// independently. Both share the single process-wide database lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Store {
    PrimaryData,
    OutboundQueue,
}

impl Store {
    /// Every store, in startup order
    pub const ALL: [Store; 2] = [Store::PrimaryData, Store::OutboundQueue];

    /// File name of the live database (and of its pristine image)
    pub fn file_name(self) -> &'static str {
        match self {
            Store::PrimaryData => "primary_data.db3",
            Store::OutboundQueue => "outbound_queue.db3",
        }
    }

    /// Schema version this build expects to find in the store
    pub fn expected_schema_version(self) -> i64 {
        match self {
            Store::PrimaryData => PRIMARY_DATA_SCHEMA_VERSION,
            Store::OutboundQueue => OUTBOUND_QUEUE_SCHEMA_VERSION,
        }
    }

    /// Whether the schema row carries the device identity columns
    /// (account number, activation, manufacturing flag, service code)
    pub fn carries_identity(self) -> bool {
        matches!(self, Store::PrimaryData)
    }

    /// Whether the schema row carries sync watermark columns
    pub fn tracks_watermarks(self) -> bool {
        matches!(self, Store::PrimaryData)
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Store::PrimaryData => write!(f, "PRIMARY_DATA"),
            Store::OutboundQueue => write!(f, "OUTBOUND_QUEUE"),
        }
    }
}

impl FromStr for Store {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRIMARY_DATA" => Ok(Store::PrimaryData),
            "OUTBOUND_QUEUE" => Ok(Store::OutboundQueue),
            _ => Err(DomainError::UnknownStore(s.to_string())),
        }
    }
}
