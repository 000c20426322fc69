// Column-name to ordinal lookup, built once per result set

use dockstore_core::error::{AppError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};
use std::collections::HashMap;

/// Case-insensitive map from column name to ordinal.
///
/// Built from the first row of a result set and reused for every row, so
/// repositories resolve names once instead of per row. When a name appears
/// twice (e.g. a join selecting `ID` from two tables) the first occurrence
/// wins, matching a linear scan.
#[derive(Debug, Clone, Default)]
pub struct OrdinalCache {
    ordinals: HashMap<String, usize>,
    len: usize,
}

impl OrdinalCache {
    pub fn from_row(row: &SqliteRow) -> Self {
        Self::from_columns(row.columns().iter().map(|c| c.name()))
    }

    pub fn from_columns<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ordinals = HashMap::new();
        let mut len = 0;
        for (ordinal, name) in names.into_iter().enumerate() {
            ordinals.entry(name.to_uppercase()).or_insert(ordinal);
            len = ordinal + 1;
        }
        Self { ordinals, len }
    }

    /// Ordinal of `name`; a missing column means code and schema disagree
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.try_ordinal(name)
            .ok_or_else(|| AppError::ColumnNotFound(name.to_string()))
    }

    pub fn try_ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(&name.to_uppercase()).copied()
    }

    /// Number of columns in the result set
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
