//! tokio-postgres errors → engine error taxonomy.

use tokio_postgres::error::SqlState;
use upsert_engine::{DbError, MetadataError};

/// Classify a driver error.
///
/// Closed connections, SQLSTATE class 08 (connection exception), and
/// administrator shutdowns are connection failures; everything else is a
/// rejected statement. The message is the server's own text.
pub fn classify(error: &tokio_postgres::Error, client_closed: bool) -> DbError {
    let message = match error.as_db_error() {
        Some(db) => db.to_string(),
        None => error.to_string(),
    };
    if client_closed || error.is_closed() || error.code().is_some_and(is_connection_state) {
        DbError::connection(message)
    } else {
        DbError::statement(message)
    }
}

fn is_connection_state(state: &SqlState) -> bool {
    state.code().starts_with("08")
        || *state == SqlState::ADMIN_SHUTDOWN
        || *state == SqlState::CRASH_SHUTDOWN
        || *state == SqlState::CANNOT_CONNECT_NOW
}

/// Metadata query failure.
pub fn metadata_error(error: tokio_postgres::Error) -> MetadataError {
    MetadataError::Query(error.to_string())
}
