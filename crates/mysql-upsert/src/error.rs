//! mysql_async errors → engine error taxonomy.

use mysql_async::{DriverError, Error};
use upsert_engine::{DbError, MetadataError};

/// Server error codes that end the session.
const CONNECTION_CODES: &[u16] = &[
    1040, // ER_CON_COUNT_ERROR
    1053, // ER_SERVER_SHUTDOWN
    1152, // ER_ABORTING_CONNECTION
    1927, // ER_CONNECTION_KILLED
];

/// Classify a driver error.
///
/// I/O failures, closed connections, bad URLs, and server shutdown codes are
/// connection failures; every other server error is a rejected statement.
pub fn classify(error: &Error) -> DbError {
    let message = error.to_string();
    if is_connection_error(error) {
        DbError::connection(message)
    } else {
        DbError::statement(message)
    }
}

fn is_connection_error(error: &Error) -> bool {
    match error {
        Error::Io(_) | Error::Url(_) => true,
        Error::Driver(driver) => matches!(
            driver,
            DriverError::ConnectionClosed | DriverError::PoolDisconnected
        ),
        Error::Server(server) => is_connection_code(server.code),
        _ => false,
    }
}

fn is_connection_code(code: u16) -> bool {
    CONNECTION_CODES.contains(&code)
}

/// Metadata query failure.
pub fn metadata_error(error: Error) -> MetadataError {
    MetadataError::Query(error.to_string())
}
