//! Table metadata consumed by the engine.
//!
//! ## Type Hierarchy
//!
//! - `TableRef` - schema-qualified table identifier
//! - `ColumnDefinition` - one column and its declared type
//! - `KeyGroup` - primary key or a named unique-index column list
//! - `TableMetadata` - everything the engine needs to know about one table
//! - `ColumnSet` - the ordered columns a statement shape is built against

use crate::error::MetadataError;
use crate::record::RecordFields;
use crate::types::SqlType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema-qualified table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (or database) name; `None` uses the connection default
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name
    pub name: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
        }
    }

    /// Replace the schema when an override is configured.
    pub fn with_schema_override(mut self, schema: Option<&str>) -> Self {
        if let Some(schema) = schema {
            self.schema = Some(schema.to_string());
        }
        self
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A column and its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

impl ColumnDefinition {
    /// Create a column definition.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Named, ordered list of columns whose combined value is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyGroup {
    /// Constraint or index name
    pub name: String,
    /// Key columns in index order
    pub columns: Vec<String>,
}

impl KeyGroup {
    /// Create a key group.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// The primary-key group, possibly empty.
    pub fn primary(columns: Vec<String>) -> Self {
        Self::new("PRIMARY", columns)
    }

    /// Whether the group has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether the group includes the column.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Metadata for one target table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    table: TableRef,
    columns: Vec<ColumnDefinition>,
    primary_key: KeyGroup,
    unique_groups: Vec<KeyGroup>,
}

impl TableMetadata {
    /// Assemble and validate metadata.
    ///
    /// Every key column must be a known column; unknown declared types have
    /// already been filtered out by the provider.
    pub fn new(
        table: TableRef,
        columns: Vec<ColumnDefinition>,
        primary_key: KeyGroup,
        unique_groups: Vec<KeyGroup>,
    ) -> Result<Self, MetadataError> {
        if columns.is_empty() {
            return Err(MetadataError::TableNotFound(table.to_string()));
        }
        for group in std::iter::once(&primary_key).chain(unique_groups.iter()) {
            for column in &group.columns {
                if !columns.iter().any(|c| &c.name == column) {
                    return Err(MetadataError::UnknownKeyColumn {
                        group: group.name.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(Self {
            table,
            columns,
            primary_key,
            unique_groups,
        })
    }

    /// Target table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Declared type of a column.
    pub fn column_type(&self, column: &str) -> Option<SqlType> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.sql_type)
    }

    /// Primary-key group (empty when the table has none).
    pub fn primary_key(&self) -> &KeyGroup {
        &self.primary_key
    }

    /// Secondary unique-index groups.
    pub fn unique_groups(&self) -> &[KeyGroup] {
        &self.unique_groups
    }

    /// Derive the statement column set from a record.
    ///
    /// Columns keep metadata order, so the shape does not depend on the
    /// record's key order. Returns `None` when no field matches a column.
    pub fn column_set_for(&self, fields: &RecordFields) -> Option<ColumnSet> {
        let columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| fields.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        if columns.is_empty() {
            None
        } else {
            Some(ColumnSet { columns })
        }
    }
}

/// Ordered, de-duplicated columns a statement shape is built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<String>,
}

impl ColumnSet {
    /// Build from names, dropping duplicates but keeping first positions.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        Self { columns }
    }

    /// Column names in binding order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the column participates.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
