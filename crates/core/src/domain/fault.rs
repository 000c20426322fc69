// Device Fault Model

use crate::domain::Store;
use serde::{Deserialize, Serialize};

/// Device-level error surfaced to the operator by health reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceFault {
    /// A store failed to start; all data access to it is invalid until a
    /// successful start or reset
    DatabaseNotStarted { store: Store, reason: String },
}

impl DeviceFault {
    pub fn store(&self) -> Store {
        match self {
            DeviceFault::DatabaseNotStarted { store, .. } => *store,
        }
    }
}

impl std::fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFault::DatabaseNotStarted { store, reason } => {
                write!(f, "database {} not started: {}", store, reason)
            }
        }
    }
}
