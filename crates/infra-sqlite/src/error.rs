// sqlx::Error -> SessionError mapping
// (cannot implement From<sqlx::Error> in core: orphan rules + no sqlx there)

use order_edit_core::port::SessionError;

// SQLite primary result codes: https://www.sqlite.org/rescode.html
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_FULL: i32 = 13;
const SQLITE_CONSTRAINT: i32 = 19;

/// Convert sqlx::Error to SessionError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> SessionError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let Some(code) = db_err.code() else {
                return SessionError::Other(format!("Database error: {}", db_err.message()));
            };
            let code_str = code.as_ref();

            // Extended codes carry the primary code in the low byte
            match code_str.parse::<i32>().map(|c| c & 0xff) {
                Ok(SQLITE_BUSY) | Ok(SQLITE_LOCKED) => {
                    SessionError::Busy(format!("{} ({})", db_err.message(), code_str))
                }
                Ok(SQLITE_CONSTRAINT) => {
                    SessionError::Constraint(format!("{} ({})", db_err.message(), code_str))
                }
                Ok(SQLITE_FULL) => SessionError::Database {
                    code: code_str.to_string(),
                    message: format!("Database full: {}", db_err.message()),
                },
                _ => SessionError::Database {
                    code: code_str.to_string(),
                    message: db_err.message().to_string(),
                },
            }
        }
        sqlx::Error::Io(io_err) => SessionError::Connection(io_err.to_string()),
        sqlx::Error::WorkerCrashed => SessionError::Closed,
        sqlx::Error::RowNotFound => SessionError::Other("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            SessionError::Other(format!("Column not found: {}", col))
        }
        _ => SessionError::Other(err.to_string()),
    }
}
