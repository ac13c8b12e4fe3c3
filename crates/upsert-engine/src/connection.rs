//! Collaborator interfaces consumed by the engine.
//!
//! The engine owns no database driver. A driver crate implements
//! [`UpsertConnection`] for statement execution and
//! [`ColumnMetadataProvider`] for table introspection.

use crate::dialect::Dialect;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;
use upsert_core::{
    BindValue, ColumnDefinition, DbError, KeyGroup, MetadataError, TableMetadata, TableRef,
};

/// SQL text with bound parameters, ready for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// Parameterized SQL
    pub sql: String,
    /// Parameters in placeholder order
    pub params: Vec<BindValue>,
}

/// Failure of a batch submission.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Per-statement results; failed rows are identified individually.
    Rows(Vec<Result<u64, DbError>>),
    /// The batch failed as a whole; no row-level detail is available.
    Whole(DbError),
}

/// A single open database connection owned by one engine invocation.
///
/// Statements run inside the connection's current transaction; nothing is
/// durable until [`commit`](UpsertConnection::commit).
#[async_trait]
pub trait UpsertConnection: Send {
    /// SQL dialect spoken by the connection.
    fn dialect(&self) -> Dialect;

    /// Apply a statement timeout to every subsequent statement.
    async fn configure_timeout(&mut self, timeout: Duration) -> Result<(), DbError>;

    /// Run a probe query; `true` when it returns at least one row.
    async fn probe(&mut self, sql: &str, params: &[BindValue]) -> Result<bool, DbError>;

    /// Execute one statement, returning the affected-row count.
    async fn execute(&mut self, sql: &str, params: &[BindValue]) -> Result<u64, DbError>;

    /// Execute a batch, returning one affected-row count per statement.
    async fn execute_batch(&mut self, batch: &[BoundStatement]) -> Result<Vec<u64>, BatchError>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), DbError>;
}

/// Source of table metadata.
#[async_trait]
pub trait ColumnMetadataProvider: Send {
    /// Declared type of every column the engine can bind.
    ///
    /// Columns with types outside the supported set are left out.
    async fn column_types(&mut self, table: &TableRef) -> Result<Vec<ColumnDefinition>, MetadataError>;

    /// Primary-key columns in key order; empty when the table has none.
    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>, MetadataError>;

    /// Secondary unique-index groups.
    async fn unique_key_groups(&mut self, table: &TableRef) -> Result<Vec<KeyGroup>, MetadataError>;
}

/// Load and validate everything the engine needs about one table.
///
/// Key groups referencing columns that were filtered out (unsupported types)
/// are dropped with a warning; a unique group identical to the primary key is
/// not probed twice.
pub async fn load_table_metadata<P>(
    provider: &mut P,
    table: &TableRef,
) -> Result<TableMetadata, MetadataError>
where
    P: ColumnMetadataProvider + ?Sized,
{
    let columns = provider.column_types(table).await?;
    let known = |group: &KeyGroup| {
        group
            .columns
            .iter()
            .all(|c| columns.iter().any(|def| &def.name == c))
    };

    let mut primary_key = KeyGroup::primary(provider.primary_key(table).await?);
    if !known(&primary_key) {
        warn!(
            "Ignoring primary key of {table}: it references columns with unsupported types ({:?})",
            primary_key.columns
        );
        primary_key = KeyGroup::primary(Vec::new());
    }

    let mut unique_groups = Vec::new();
    for group in provider.unique_key_groups(table).await? {
        if group.is_empty() || group.columns == primary_key.columns {
            continue;
        }
        if !known(&group) {
            warn!(
                "Ignoring unique key '{}' of {table}: it references columns with unsupported types",
                group.name
            );
            continue;
        }
        unique_groups.push(group);
    }

    TableMetadata::new(table.clone(), columns, primary_key, unique_groups)
}
