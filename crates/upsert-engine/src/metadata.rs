//! File-backed table metadata.
//!
//! Lets the engine run against a table description written by hand (YAML or
//! TOML) instead of database introspection, e.g. when the connecting role
//! cannot read the catalog.
//!
//! ```yaml
//! columns:
//!   - name: id
//!     type: bigint
//!   - name: email
//!     type: varchar(255)
//! primary_key: [id]
//! unique_keys:
//!   - name: users_email_key
//!     columns: [email]
//! ```

use crate::connection::ColumnMetadataProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;
use upsert_core::{ColumnDefinition, KeyGroup, MetadataError, SqlType, TableRef};

/// One column as written in the file; `type` is a declared database type name.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
}

/// Table description loaded from a file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticMetadata {
    #[serde(default)]
    pub columns: Vec<DeclaredColumn>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique_keys: Vec<KeyGroup>,
}

impl StaticMetadata {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, MetadataError> {
        serde_yaml::from_str(text).map_err(|e| MetadataError::Query(e.to_string()))
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, MetadataError> {
        toml::from_str(text).map_err(|e| MetadataError::Query(e.to_string()))
    }

    /// Load from a file, choosing the format by extension (`.toml`, else YAML).
    pub fn from_file(path: &Path) -> Result<Self, MetadataError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MetadataError::Query(format!("failed to read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

#[async_trait]
impl ColumnMetadataProvider for StaticMetadata {
    async fn column_types(&mut self, table: &TableRef) -> Result<Vec<ColumnDefinition>, MetadataError> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match SqlType::from_declared(&column.declared_type) {
                Some(sql_type) => columns.push(ColumnDefinition::new(&column.name, sql_type)),
                None => warn!(
                    "Skipping column {}.{}: unsupported type '{}'",
                    table, column.name, column.declared_type
                ),
            }
        }
        Ok(columns)
    }

    async fn primary_key(&mut self, _table: &TableRef) -> Result<Vec<String>, MetadataError> {
        Ok(self.primary_key.clone())
    }

    async fn unique_key_groups(&mut self, _table: &TableRef) -> Result<Vec<KeyGroup>, MetadataError> {
        Ok(self.unique_keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::load_table_metadata;

    const USERS_YAML: &str = r#"
columns:
  - name: id
    type: bigint
  - name: email
    type: varchar(255)
  - name: location
    type: geometry
primary_key: [id]
unique_keys:
  - name: users_email_key
    columns: [email]
  - name: users_location_key
    columns: [location]
"#;

    #[tokio::test]
    async fn test_yaml_metadata_filters_unsupported() {
        let mut provider = StaticMetadata::from_yaml(USERS_YAML).unwrap();
        let table = TableRef::new(None, "users");
        let meta = load_table_metadata(&mut provider, &table).await.unwrap();

        assert_eq!(meta.columns().len(), 2);
        assert_eq!(meta.column_type("id"), Some(SqlType::Long));
        assert_eq!(meta.primary_key().columns, vec!["id"]);
        assert_eq!(meta.unique_groups().len(), 1);
        assert_eq!(meta.unique_groups()[0].name, "users_email_key");
    }

    #[tokio::test]
    async fn test_toml_metadata() {
        let text = r#"
primary_key = ["sku"]

[[columns]]
name = "sku"
type = "text"

[[columns]]
name = "price"
type = "numeric(38, 2)"
"#;
        let mut provider = StaticMetadata::from_toml(text).unwrap();
        let meta = load_table_metadata(&mut provider, &TableRef::new(None, "items"))
            .await
            .unwrap();
        assert_eq!(meta.column_type("price"), Some(SqlType::Numeric));
        assert!(meta.unique_groups().is_empty());
    }

    #[tokio::test]
    async fn test_empty_metadata_is_table_not_found() {
        let mut provider = StaticMetadata::default();
        let err = load_table_metadata(&mut provider, &TableRef::new(None, "ghost"))
            .await
            .unwrap_err();
        assert_eq!(err, MetadataError::TableNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_unique_group_matching_primary_key_dropped() {
        let text = r#"
columns:
  - {name: id, type: int}
primary_key: [id]
unique_keys:
  - {name: id_key, columns: [id]}
"#;
        let mut provider = StaticMetadata::from_yaml(text).unwrap();
        let meta = load_table_metadata(&mut provider, &TableRef::new(None, "t"))
            .await
            .unwrap();
        assert!(meta.unique_groups().is_empty());
    }
}
