// Schema Record Domain Model
//
// Every store holds exactly one row in its SCHEMA table. The row is created by the
// pristine image shipped with the firmware and is only mutated by the schema manager.

use crate::domain::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the single-row schema table present in every store
pub const SCHEMA_TABLE: &str = "SCHEMA";

/// Schema version of the primary data store expected by this build
pub const PRIMARY_DATA_SCHEMA_VERSION: i64 = 14;

/// Schema version of the outbound queue store expected by this build
pub const OUTBOUND_QUEUE_SCHEMA_VERSION: i64 = 3;

/// Column names of the schema table
pub mod columns {
    pub const VERSION: &str = "VERSION";
    pub const ACCOUNT_NUM: &str = "ACCOUNTNUM";
    pub const ACTIVATED: &str = "ACTIVATED";
    pub const IS_MANUFACTURING: &str = "ISMANUFACTURING";
    pub const SERVICE_CODE: &str = "SERVICECODE";
}

/// Sync watermark: "data of this category is current as of this UTC time".
///
/// Watermark columns were added to the primary data schema over several
/// releases; a row written by an older build lacks the newer columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Watermark {
    Cylinders,
    Schedules,
    EventJournals,
    Settings,
    Equipment,
    CriticalErrors,
}

impl Watermark {
    pub const ALL: [Watermark; 6] = [
        Watermark::Cylinders,
        Watermark::Schedules,
        Watermark::EventJournals,
        Watermark::Settings,
        Watermark::Equipment,
        Watermark::CriticalErrors,
    ];

    /// Column holding this watermark in the schema table
    pub fn column(self) -> &'static str {
        match self {
            Watermark::Cylinders => "CYLINDERSVERSION",
            Watermark::Schedules => "SCHEDULESVERSION",
            Watermark::EventJournals => "EVENTJOURNALSVERSION",
            Watermark::Settings => "SETTINGSVERSION",
            Watermark::Equipment => "EQUIPMENTVERSION",
            Watermark::CriticalErrors => "CRITICALERRORSVERSION",
        }
    }

    /// First primary data schema version containing the column
    pub fn introduced_in(self) -> i64 {
        match self {
            Watermark::Cylinders | Watermark::Schedules => 1,
            Watermark::EventJournals => 5,
            Watermark::Settings => 8,
            Watermark::Equipment => 11,
            Watermark::CriticalErrors => 13,
        }
    }

    /// Watermarks whose columns exist in a schema of the given version
    pub fn available_in(version: i64) -> impl Iterator<Item = Watermark> {
        Self::ALL
            .into_iter()
            .filter(move |w| w.introduced_in() <= version)
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Fields carried across a store reset.
///
/// Everything else in the schema row is rebuilt from the pristine image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedFields {
    pub account_num: Option<String>,
    pub activated: Option<bool>,
    pub is_manufacturing: Option<bool>,
    pub service_code: Option<String>,
}

/// Typed view of a store's schema row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub version: i64,
    pub account_num: Option<String>,
    pub activated: Option<bool>,
    pub is_manufacturing: Option<bool>,
    pub service_code: Option<String>,
    pub watermarks: BTreeMap<Watermark, DateTime<Utc>>,
}

impl SchemaRecord {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            account_num: None,
            activated: None,
            is_manufacturing: None,
            service_code: None,
            watermarks: BTreeMap::new(),
        }
    }

    pub fn watermark(&self, watermark: Watermark) -> Option<DateTime<Utc>> {
        self.watermarks.get(&watermark).copied()
    }

    /// True iff the row's version is the one this build expects for `store`.
    /// There is no incremental migration: anything else means reset.
    pub fn is_compatible_with(&self, store: Store) -> bool {
        self.version == store.expected_schema_version()
    }

    pub fn preserved_fields(&self) -> PreservedFields {
        PreservedFields {
            account_num: self.account_num.clone(),
            activated: self.activated,
            is_manufacturing: self.is_manufacturing,
            service_code: self.service_code.clone(),
        }
    }

    pub fn apply_preserved(&mut self, fields: &PreservedFields) {
        self.account_num = fields.account_num.clone();
        self.activated = fields.activated;
        self.is_manufacturing = fields.is_manufacturing;
        self.service_code = fields.service_code.clone();
    }
}
