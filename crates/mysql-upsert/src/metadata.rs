//! Table introspection through `INFORMATION_SCHEMA`.

use crate::error::metadata_error;
use async_trait::async_trait;
use mysql_async::{prelude::*, Pool};
use tracing::warn;
use upsert_engine::{
    ColumnDefinition, ColumnMetadataProvider, KeyGroup, MetadataError, SqlType, TableRef,
};

const COLUMNS_QUERY: &str = "
    SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "
    SELECT COLUMN_NAME
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
      AND CONSTRAINT_NAME = 'PRIMARY'
    ORDER BY ORDINAL_POSITION";

// COLUMN_NAME is NULL for functional key parts.
const UNIQUE_KEYS_QUERY: &str = "
    SELECT INDEX_NAME, COLUMN_NAME
    FROM INFORMATION_SCHEMA.STATISTICS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
      AND NON_UNIQUE = 0 AND INDEX_NAME <> 'PRIMARY'
    ORDER BY INDEX_NAME, SEQ_IN_INDEX";

/// Map a MySQL column to a bindable type.
pub fn declared_type(data_type: &str, column_type: &str) -> Option<SqlType> {
    // TINYINT(1) is commonly used for boolean in MySQL
    if column_type.to_lowercase().starts_with("tinyint(1)") {
        return Some(SqlType::Boolean);
    }
    SqlType::from_declared(data_type)
}

/// Fold `(index, column)` rows ordered by index into key groups. Groups with
/// a functional key part are dropped.
fn group_unique_keys(rows: Vec<(String, Option<String>)>) -> Vec<KeyGroup> {
    let mut groups: Vec<(String, Option<Vec<String>>)> = Vec::new();
    for (index, column) in rows {
        if groups.last().map(|(name, _)| name != &index).unwrap_or(true) {
            groups.push((index, Some(Vec::new())));
        }
        if let Some((_, columns)) = groups.last_mut() {
            match (columns.as_mut(), column) {
                (Some(cols), Some(column)) => cols.push(column),
                _ => *columns = None,
            }
        }
    }
    groups
        .into_iter()
        .filter_map(|(name, columns)| columns.map(|cols| KeyGroup::new(name, cols)))
        .collect()
}

/// Reads metadata with connections from a pool.
pub struct MySqlMetadataProvider {
    pool: Pool,
}

impl MySqlMetadataProvider {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn query<T: FromRow + Send + 'static>(
        &self,
        sql: &str,
        table: &TableRef,
    ) -> Result<Vec<T>, MetadataError> {
        let mut conn = self.pool.get_conn().await.map_err(metadata_error)?;
        conn.exec(sql, (table.schema.clone(), table.name.clone()))
            .await
            .map_err(metadata_error)
    }
}

#[async_trait]
impl ColumnMetadataProvider for MySqlMetadataProvider {
    async fn column_types(&mut self, table: &TableRef) -> Result<Vec<ColumnDefinition>, MetadataError> {
        let rows: Vec<(String, String, String)> = self.query(COLUMNS_QUERY, table).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for (name, data_type, column_type) in rows {
            match declared_type(&data_type, &column_type) {
                Some(sql_type) => columns.push(ColumnDefinition::new(name, sql_type)),
                None => warn!("Skipping column {table}.{name}: unsupported type '{column_type}'"),
            }
        }
        Ok(columns)
    }

    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>, MetadataError> {
        self.query(PRIMARY_KEY_QUERY, table).await
    }

    async fn unique_key_groups(&mut self, table: &TableRef) -> Result<Vec<KeyGroup>, MetadataError> {
        let rows: Vec<(String, Option<String>)> = self.query(UNIQUE_KEYS_QUERY, table).await?;
        Ok(group_unique_keys(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(declared_type("tinyint", "tinyint(1)"), Some(SqlType::Boolean));
        assert_eq!(declared_type("TINYINT", "tinyint(4)"), Some(SqlType::Integer));
        assert_eq!(declared_type("int", "int(11)"), Some(SqlType::Integer));
        assert_eq!(declared_type("bigint", "bigint(20) unsigned"), Some(SqlType::Long));
        assert_eq!(declared_type("decimal", "decimal(10,2)"), Some(SqlType::Numeric));
        assert_eq!(declared_type("datetime", "datetime(6)"), Some(SqlType::Timestamp));
        assert_eq!(declared_type("enum", "enum('a','b')"), Some(SqlType::String));
        assert_eq!(declared_type("json", "json"), Some(SqlType::Json));
        assert_eq!(declared_type("longblob", "longblob"), Some(SqlType::Blob));
        assert_eq!(declared_type("geometry", "geometry"), None);
    }

    #[test]
    fn test_group_unique_keys() {
        let rows = vec![
            ("email_key".to_string(), Some("email".to_string())),
            ("expr_key".to_string(), None),
            ("tenant_slug".to_string(), Some("tenant".to_string())),
            ("tenant_slug".to_string(), Some("slug".to_string())),
        ];
        let groups = group_unique_keys(rows);
        assert_eq!(
            groups,
            vec![
                KeyGroup::new("email_key", vec!["email".to_string()]),
                KeyGroup::new("tenant_slug", vec!["tenant".to_string(), "slug".to_string()]),
            ]
        );
    }
}
