use crate::error::DriverError;

/// Statement text contained nothing to execute.
pub const EMPTY_QUERY: i32 = 1065;
/// Several statements were sent without `ClientFlags::MULTI_STATEMENTS`.
pub const MULTI_STATEMENTS_DISABLED: i32 = 1064;
/// The handle has not been connected, or was closed.
pub const NOT_CONNECTED: i32 = 2006;
/// The endpoint kind cannot be served by SQLite.
pub const UNSUPPORTED_ENDPOINT: i32 = 2047;

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(native, message) => DriverError::new(
                native.extended_code,
                message.unwrap_or_else(|| native.to_string()),
            ),
            other => DriverError::new(DriverError::UNKNOWN, other.to_string()),
        }
    }
}

pub(crate) fn not_connected() -> DriverError {
    DriverError::new(NOT_CONNECTED, "SQLite handle is not connected")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_failure_keeps_extended_code_and_message() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO missing VALUES (1)", []).unwrap_err();
        let driver: DriverError = err.into();
        assert_eq!(driver.code, rusqlite::ffi::SQLITE_ERROR);
        assert!(driver.message.contains("missing"), "{driver}");
    }

    #[test]
    fn other_errors_map_to_unknown_code() {
        let driver: DriverError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(driver.code, DriverError::UNKNOWN);
    }
}
