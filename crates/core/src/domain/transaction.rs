// Transaction Vocabulary

use serde::{Deserialize, Serialize};

/// Caller's expectation about the write pattern of a unit of work.
///
/// Repositories use it to choose the order of the "update, else insert"
/// dance: with `LikelyInsert` the insert is tried first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionHint {
    /// Update the existing row, insert when nothing was updated
    #[default]
    UpdateThenInsert,
    /// Insert the row, update when the insert hits a duplicate key
    LikelyInsert,
}

/// Non-fatal annotation collected during a unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
