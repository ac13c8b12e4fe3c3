//! Table introspection through `information_schema` and `pg_index`.

use crate::error::metadata_error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::Client;
use tracing::warn;
use upsert_engine::{
    ColumnDefinition, ColumnMetadataProvider, KeyGroup, MetadataError, SqlType, TableRef,
};

const COLUMNS_QUERY: &str = "
SELECT c.column_name::text,
       c.data_type::text,
       c.udt_name::text,
       EXISTS (
           SELECT 1 FROM pg_catalog.pg_type t
           WHERE t.typname = c.udt_name AND t.typtype = 'e'
       ) AS is_enum
FROM information_schema.columns c
WHERE c.table_schema = COALESCE($1, current_schema())
  AND c.table_name = $2
ORDER BY c.ordinal_position";

/// Unique, non-partial, non-expression indexes; primary key first.
const INDEXES_QUERY: &str = "
SELECT i.relname::text AS index_name,
       x.indisprimary,
       array_agg(a.attname::text ORDER BY k.ord) AS columns
FROM pg_catalog.pg_index x
JOIN pg_catalog.pg_class t ON t.oid = x.indrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_class i ON i.oid = x.indexrelid
CROSS JOIN LATERAL unnest(x.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = COALESCE($1, current_schema())
  AND t.relname = $2
  AND x.indisunique
  AND x.indpred IS NULL
  AND x.indexprs IS NULL
GROUP BY i.relname, x.indisprimary
ORDER BY x.indisprimary DESC, i.relname";

/// Map an `information_schema.columns` row to a bindable type.
///
/// Enum columns bind as text; other user-defined types are resolved by their
/// type name (`citext`, domains over known names) or skipped.
pub fn declared_type(data_type: &str, udt_name: &str, is_enum: bool) -> Option<SqlType> {
    if is_enum {
        return Some(SqlType::String);
    }
    match data_type {
        "ARRAY" => None,
        "USER-DEFINED" => SqlType::from_declared(udt_name),
        other => SqlType::from_declared(other),
    }
}

/// Reads metadata over a shared client.
pub struct PgMetadataProvider {
    client: Arc<Client>,
}

impl PgMetadataProvider {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    async fn indexes(&self, table: &TableRef) -> Result<Vec<(String, bool, Vec<String>)>, MetadataError> {
        let rows = self
            .client
            .query(INDEXES_QUERY, &[&table.schema, &table.name])
            .await
            .map_err(metadata_error)?;
        Ok(rows
            .iter()
            .map(|row| (row.get(0), row.get(1), row.get(2)))
            .collect())
    }
}

#[async_trait]
impl ColumnMetadataProvider for PgMetadataProvider {
    async fn column_types(&mut self, table: &TableRef) -> Result<Vec<ColumnDefinition>, MetadataError> {
        let rows = self
            .client
            .query(COLUMNS_QUERY, &[&table.schema, &table.name])
            .await
            .map_err(metadata_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let udt_name: String = row.get(2);
            let is_enum: bool = row.get(3);
            match declared_type(&data_type, &udt_name, is_enum) {
                Some(sql_type) => columns.push(ColumnDefinition::new(name, sql_type)),
                None => warn!("Skipping column {table}.{name}: unsupported type '{data_type}'"),
            }
        }
        Ok(columns)
    }

    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>, MetadataError> {
        Ok(self
            .indexes(table)
            .await?
            .into_iter()
            .find(|(_, primary, _)| *primary)
            .map(|(_, _, columns)| columns)
            .unwrap_or_default())
    }

    async fn unique_key_groups(&mut self, table: &TableRef) -> Result<Vec<KeyGroup>, MetadataError> {
        Ok(self
            .indexes(table)
            .await?
            .into_iter()
            .filter(|(_, primary, _)| !primary)
            .map(|(name, _, columns)| KeyGroup::new(name, columns))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(declared_type("integer", "int4", false), Some(SqlType::Integer));
        assert_eq!(declared_type("bigint", "int8", false), Some(SqlType::Long));
        assert_eq!(declared_type("numeric", "numeric", false), Some(SqlType::Numeric));
        assert_eq!(
            declared_type("timestamp with time zone", "timestamptz", false),
            Some(SqlType::Timestamp)
        );
        assert_eq!(declared_type("jsonb", "jsonb", false), Some(SqlType::Json));
        assert_eq!(declared_type("bytea", "bytea", false), Some(SqlType::Blob));
        assert_eq!(declared_type("USER-DEFINED", "mood", true), Some(SqlType::String));
        assert_eq!(declared_type("USER-DEFINED", "citext", false), Some(SqlType::String));
        assert_eq!(declared_type("USER-DEFINED", "geometry", false), None);
        assert_eq!(declared_type("ARRAY", "_int4", false), None);
    }
}
