//! Error taxonomy for the upsert engine.
//!
//! Every failure the engine can observe falls into one of the classes of
//! [`ErrorClass`]. Record-level errors ([`RecordError`]) are turned into
//! Outcomes at the record boundary; configuration and connector errors end
//! the invocation.

use crate::types::SqlType;
use serde::Serialize;
use thiserror::Error;

/// Classification carried by every failure Outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Record content absent or unparseable
    Input,
    /// Field value not coercible to its declared type
    InvalidArgument,
    /// Statement rejected by the database
    Statement,
    /// Connection lost or otherwise unusable
    Connector,
}

/// Invalid engine configuration. Fatal before any record is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Batch size below zero.
    #[error("Configuration error: batch size must not be negative (got {0})")]
    NegativeBatchSize(i64),

    /// Batch size too large for this platform.
    #[error("Configuration error: batch size {0} is too large")]
    BatchSizeTooLarge(i64),

    /// Native upsert requested for a dialect without insert-or-update syntax.
    #[error("Configuration error: dialect {0} has no native upsert statement")]
    NativeUpsertUnsupported(String),
}

/// Record content that cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The record's content could not be read at all.
    #[error("Record content unavailable: {0}")]
    Unreadable(String),

    /// The content is not valid JSON.
    #[error("Record is not valid JSON: {0}")]
    Malformed(String),

    /// The content is JSON but not an object.
    #[error("Record must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// None of the record's fields match a column of the table.
    #[error("Record has no fields matching columns of table '{0}'")]
    NoUsableColumns(String),
}

/// A field value that cannot be coerced into its declared SQL type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid argument for column '{column}' ({sql_type}): {reason}")]
pub struct ValueError {
    /// Column being bound
    pub column: String,
    /// Declared type of the column
    pub sql_type: SqlType,
    /// What was wrong with the value
    pub reason: String,
}

impl ValueError {
    /// Create a value error for a column.
    pub fn new(column: impl Into<String>, sql_type: SqlType, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            sql_type,
            reason: reason.into(),
        }
    }
}

/// Whether a database failure leaves the connection usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The statement was rejected; the connection stays usable.
    Statement,
    /// The connection is gone; nothing further can be executed.
    Connection,
}

/// Failure reported by a driver.
///
/// `message` is the driver's own text, passed through verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    /// Recoverability of the failure
    pub kind: DbErrorKind,
    /// Driver message
    pub message: String,
}

impl DbError {
    /// A rejected statement (constraint violation, syntax, type mismatch).
    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Statement,
            message: message.into(),
        }
    }

    /// A lost or unusable connection.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Connection,
            message: message.into(),
        }
    }

    /// Whether the invocation must stop.
    pub fn is_fatal(&self) -> bool {
        self.kind == DbErrorKind::Connection
    }
}

/// Failure to obtain table metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Metadata query failed.
    #[error("Metadata query failed: {0}")]
    Query(String),

    /// The table has no columns visible to the connection.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A key group names a column the table does not have.
    #[error("Key group '{group}' references unknown column '{column}'")]
    UnknownKeyColumn {
        /// Key group name
        group: String,
        /// Offending column
        column: String,
    },
}

/// Any failure attributable to one record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Record content unusable.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Field value not coercible.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Statement or connection failure.
    #[error(transparent)]
    Database(#[from] DbError),
}

impl RecordError {
    /// Taxonomy class of this failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            RecordError::Input(_) => ErrorClass::Input,
            RecordError::Value(_) => ErrorClass::InvalidArgument,
            RecordError::Database(e) if e.is_fatal() => ErrorClass::Connector,
            RecordError::Database(_) => ErrorClass::Statement,
        }
    }

    /// Whether the invocation must stop after reporting this failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Database(e) if e.is_fatal())
    }
}
