//! Value codec: every column read and parameter bind goes through here.
//!
//! On disk a logically absent value is always SQL NULL. In memory each primitive
//! has a sentinel standing for NULL (minimum value for integers, reals and
//! dates, zero for durations, empty for text and blobs). Reads turn NULL into
//! the sentinel; binds turn the sentinel into NULL, so the sentinel literal is
//! never persisted. `Option<T>` is supported on both sides and maps `None` to
//! NULL.
//!
//! Dates are persisted as UTC text, durations as integer tick counts
//! (100 ns units).

use crate::error::map_read_error;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use dockstore_core::error::{AppError, Result};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, ValueRef};
use tracing::error;

/// Duration ticks per second (one tick = 100 ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Text layout of persisted timestamps (always UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Bind representation of a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Time zone applied to a date read back from the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateTimeKind {
    /// Calibration and event timestamps
    #[default]
    Utc,
    /// User-facing settings
    Local,
}

/// Named, codec-converted parameter.
///
/// Statements use positional `?` placeholders; parameters bind in the order
/// they were added and the name labels them in logs and errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: SqlValue,
}

/// Typed column read with sentinel-NULL semantics
pub trait ColumnValue: Sized {
    /// Value returned for SQL NULL
    fn sentinel() -> Self;

    /// Decode a column already known to be non-NULL
    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self>;
}

/// Typed parameter bind with sentinel-NULL semantics
pub trait ToSqlValue {
    /// Bind representation; the type's sentinel becomes `SqlValue::Null`
    fn to_sql_value(&self) -> SqlValue;
}

fn decode_as<T>(row: &SqliteRow, ordinal: usize) -> Result<T>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get::<T, _>(ordinal)
        .map_err(|e| map_read_error(e, ordinal))
}

macro_rules! integer_column {
    ($($ty:ty),*) => {$(
        impl ColumnValue for $ty {
            fn sentinel() -> Self {
                <$ty>::MIN
            }

            fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
                decode_as::<$ty>(row, ordinal)
            }
        }

        impl ToSqlValue for $ty {
            fn to_sql_value(&self) -> SqlValue {
                if *self == <$ty>::MIN {
                    SqlValue::Null
                } else {
                    SqlValue::Integer(i64::from(*self))
                }
            }
        }
    )*};
}

integer_column!(i16, i32, i64);

impl ColumnValue for f64 {
    fn sentinel() -> Self {
        f64::MIN
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        decode_as::<f64>(row, ordinal)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        if *self == f64::MIN {
            SqlValue::Null
        } else {
            SqlValue::Real(*self)
        }
    }
}

/// Booleans have no sentinel: NULL reads as `false` and every bool binds a
/// value. Use `Option<bool>` for a nullable flag.
impl ColumnValue for bool {
    fn sentinel() -> Self {
        false
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        decode_as::<bool>(row, ordinal)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Integer(i64::from(*self))
    }
}

impl ColumnValue for String {
    fn sentinel() -> Self {
        String::new()
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        decode_as::<String>(row, ordinal)
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> SqlValue {
        if self.is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Text(self.to_string())
        }
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        self.as_str().to_sql_value()
    }
}

impl ColumnValue for Vec<u8> {
    fn sentinel() -> Self {
        Vec::new()
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        decode_as::<Vec<u8>>(row, ordinal)
    }
}

impl ToSqlValue for [u8] {
    fn to_sql_value(&self) -> SqlValue {
        if self.is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Blob(self.to_vec())
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        self.as_slice().to_sql_value()
    }
}

impl ColumnValue for DateTime<Utc> {
    fn sentinel() -> Self {
        DateTime::<Utc>::MIN_UTC
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        let text = decode_as::<String>(row, ordinal)?;
        parse_timestamp(&text).ok_or_else(|| {
            error!(ordinal, value = %text, "Column is not a timestamp");
            AppError::TypeMismatch {
                ordinal,
                message: format!("'{}' is not a timestamp", text),
            }
        })
    }
}

impl<Tz: TimeZone> ToSqlValue for DateTime<Tz> {
    fn to_sql_value(&self) -> SqlValue {
        let utc = self.with_timezone(&Utc);
        if utc == DateTime::<Utc>::MIN_UTC {
            SqlValue::Null
        } else {
            SqlValue::Text(format_timestamp(utc))
        }
    }
}

impl ColumnValue for TimeDelta {
    fn sentinel() -> Self {
        TimeDelta::MIN
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        decode_as::<i64>(row, ordinal).map(ticks_to_duration)
    }
}

impl ToSqlValue for TimeDelta {
    fn to_sql_value(&self) -> SqlValue {
        // Zero is accepted as a second NULL marker on write
        if *self == TimeDelta::MIN || self.is_zero() {
            SqlValue::Null
        } else {
            SqlValue::Integer(duration_to_ticks(*self))
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn sentinel() -> Self {
        None
    }

    fn decode(row: &SqliteRow, ordinal: usize) -> Result<Self> {
        T::decode(row, ordinal).map(Some)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        match self {
            Some(value) => value.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    fn to_sql_value(&self) -> SqlValue {
        (**self).to_sql_value()
    }
}

/// Explicit NULL test; fails only for an out-of-range ordinal
pub fn is_null(row: &SqliteRow, ordinal: usize) -> Result<bool> {
    let raw = row
        .try_get_raw(ordinal)
        .map_err(|e| map_read_error(e, ordinal))?;
    Ok(raw.is_null())
}

/// Read a column, returning the type's sentinel for SQL NULL.
///
/// An out-of-range ordinal or a value of the wrong type is an error: both mean
/// the code and the schema disagree.
pub fn safe_get<T: ColumnValue>(row: &SqliteRow, ordinal: usize) -> Result<T> {
    if is_null(row, ordinal)? {
        Ok(T::sentinel())
    } else {
        T::decode(row, ordinal)
    }
}

/// Read a column as `Option`, `None` for SQL NULL
pub fn get_optional<T: ColumnValue>(row: &SqliteRow, ordinal: usize) -> Result<Option<T>> {
    safe_get::<Option<T>>(row, ordinal)
}

/// Read a UTC timestamp column and present it in the requested zone.
///
/// NULL yields the minimum date, left in UTC.
pub fn safe_get_date_time(
    row: &SqliteRow,
    ordinal: usize,
    kind: DateTimeKind,
) -> Result<DateTime<FixedOffset>> {
    let utc = safe_get::<DateTime<Utc>>(row, ordinal)?;
    if utc == DateTime::<Utc>::MIN_UTC {
        return Ok(utc.fixed_offset());
    }
    Ok(match kind {
        DateTimeKind::Utc => utc.fixed_offset(),
        DateTimeKind::Local => utc.with_timezone(&Local).fixed_offset(),
    })
}

/// Build a parameter, binding NULL in place of the value's sentinel
pub fn to_parameter<T: ToSqlValue + ?Sized>(name: &str, value: &T) -> Parameter {
    Parameter {
        name: name.to_string(),
        value: value.to_sql_value(),
    }
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value.clone() {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Blob(v) => query.bind(v),
    }
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts the persisted layout, its `T`-separated variant and RFC 3339
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

pub fn duration_to_ticks(value: TimeDelta) -> i64 {
    value
        .num_seconds()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(value.subsec_nanos()) / NANOS_PER_TICK)
}

pub fn ticks_to_duration(ticks: i64) -> TimeDelta {
    TimeDelta::seconds(ticks / TICKS_PER_SECOND)
        + TimeDelta::nanoseconds((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK)
}
