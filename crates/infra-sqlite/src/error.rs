// sqlx::Error -> AppError mapping
//
// sqlx::Error cannot be converted with From here (orphan rules), so every call
// site maps through these helpers with the SQL that failed.

use dockstore_core::error::AppError;

/// SQLite extended result codes for duplicate keys
/// https://www.sqlite.org/rescode.html
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// True for duplicate-key failures (UNIQUE or PRIMARY KEY)
pub(crate) fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY)
        ),
        _ => false,
    }
}

/// Convert a statement failure to AppError, keeping the SQL text
pub(crate) fn map_sqlx_error(err: sqlx::Error, sql: &str) -> AppError {
    if is_duplicate_key(&err) {
        let message = match &err {
            sqlx::Error::Database(db_err) => db_err.message().to_string(),
            other => other.to_string(),
        };
        return AppError::ConstraintViolation {
            sql: sql.to_string(),
            message,
        };
    }

    let cause = match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // SQLITE_BUSY - another connection holds the file
            Some("5") => format!("Database locked (SQLITE_BUSY): {}", db_err.message()),
            // SQLITE_FULL - media is full
            Some("13") => format!("Database full: {}", db_err.message()),
            Some(code) => format!("Database error [{}]: {}", code, db_err.message()),
            None => format!("Database error: {}", db_err.message()),
        },
        sqlx::Error::PoolTimedOut => "Timed out acquiring a connection".to_string(),
        sqlx::Error::PoolClosed => "Connection pool closed".to_string(),
        other => other.to_string(),
    };

    AppError::DataAccess {
        sql: sql.to_string(),
        cause,
    }
}

/// Convert a column read failure to AppError
pub(crate) fn map_read_error(err: sqlx::Error, ordinal: usize) -> AppError {
    match err {
        sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
            AppError::OrdinalOutOfRange { ordinal: index, len }
        }
        sqlx::Error::ColumnNotFound(name) => AppError::ColumnNotFound(name),
        sqlx::Error::ColumnDecode { source, .. } => {
            tracing::error!(ordinal, error = %source, "Column type mismatch");
            AppError::TypeMismatch {
                ordinal,
                message: source.to_string(),
            }
        }
        other => AppError::DataAccess {
            sql: String::new(),
            cause: format!("reading column {}: {}", ordinal, other),
        },
    }
}
