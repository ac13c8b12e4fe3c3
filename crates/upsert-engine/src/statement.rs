//! Statement Builder: parameterized SQL text for one record shape.
//!
//! Every statement carries its parameter slots: the column whose value is
//! bound at each placeholder, in placeholder order. The Value Marshaller binds
//! against the slots, so SQL text and parameter order cannot drift apart.

use crate::dialect::Dialect;
use upsert_core::{ColumnSet, ConfigError, KeyGroup, RecordFields, TableMetadata};

/// What a statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Plain INSERT
    Insert,
    /// UPDATE by conflicting key columns
    Update,
    /// Dialect-native insert-or-update
    Upsert,
    /// Read-only conflict probe
    Probe,
}

impl StatementKind {
    /// Message reported for a successful write.
    pub fn success_message(&self) -> &'static str {
        match self {
            StatementKind::Insert => "Record inserted",
            StatementKind::Update => "Record updated",
            StatementKind::Upsert => "Record upserted",
            StatementKind::Probe => "Record probed",
        }
    }
}

/// SQL text plus its parameter slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Statement kind
    pub kind: StatementKind,
    /// Parameterized SQL
    pub sql: String,
    /// Column bound at each placeholder, in order
    pub slots: Vec<String>,
}

/// Builds statements against one table in one dialect.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    dialect: Dialect,
    table: String,
}

impl StatementBuilder {
    /// Create a builder for the metadata's table.
    pub fn new(dialect: Dialect, metadata: &TableMetadata) -> Self {
        Self {
            dialect,
            table: dialect.qualified_table(metadata.table()),
        }
    }

    /// Dialect in use.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quoted_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `INSERT INTO t (a, b) VALUES (?, ?)` over the column set.
    pub fn insert(&self, columns: &ColumnSet) -> Statement {
        let placeholders = (1..=columns.len())
            .map(|i| self.dialect.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        Statement {
            kind: StatementKind::Insert,
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.quoted_list(columns.columns()),
                placeholders
            ),
            slots: columns.columns().to_vec(),
        }
    }

    /// Append `col = ph` / `col IS NULL` predicates for key columns.
    ///
    /// Absent values use `IS NULL` where the dialect allows it and are left
    /// out otherwise.
    fn key_predicates(
        &self,
        key_columns: &[String],
        fields: &RecordFields,
        slots: &mut Vec<String>,
    ) -> Vec<String> {
        let mut predicates = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            let ident = self.dialect.quote_ident(column);
            if fields.has_value(column) {
                slots.push(column.clone());
                predicates.push(format!("{ident} = {}", self.dialect.placeholder(slots.len())));
            } else if self.dialect.matches_null_keys() {
                predicates.push(format!("{ident} IS NULL"));
            }
        }
        predicates
    }

    /// `UPDATE t SET … WHERE <key columns>`.
    ///
    /// Returns `None` when every column of the set is a key column (nothing
    /// to SET) or when no key predicate can be formed.
    pub fn update(
        &self,
        columns: &ColumnSet,
        key_columns: &[String],
        fields: &RecordFields,
    ) -> Option<Statement> {
        let mut slots = Vec::new();
        let mut assignments = Vec::new();
        for column in columns.columns() {
            if key_columns.contains(column) {
                continue;
            }
            slots.push(column.clone());
            assignments.push(format!(
                "{} = {}",
                self.dialect.quote_ident(column),
                self.dialect.placeholder(slots.len())
            ));
        }
        if assignments.is_empty() {
            return None;
        }

        let predicates = self.key_predicates(key_columns, fields, &mut slots);
        if predicates.is_empty() {
            return None;
        }

        Some(Statement {
            kind: StatementKind::Update,
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.table,
                assignments.join(", "),
                predicates.join(" AND ")
            ),
            slots,
        })
    }

    /// `SELECT <first key column> FROM t WHERE <key columns>`.
    ///
    /// Returns `None` when the group is empty or the record has no value for
    /// any of its columns; the group is then treated as non-conflicting.
    pub fn probe(&self, group: &KeyGroup, fields: &RecordFields) -> Option<Statement> {
        let first = group.columns.first()?;
        if !group.columns.iter().any(|c| fields.has_value(c)) {
            return None;
        }
        let mut slots = Vec::new();
        let predicates = self.key_predicates(&group.columns, fields, &mut slots);
        Some(Statement {
            kind: StatementKind::Probe,
            sql: format!(
                "SELECT {} FROM {} WHERE {}",
                self.dialect.quote_ident(first),
                self.table,
                predicates.join(" AND ")
            ),
            slots,
        })
    }

    /// Single-statement insert-or-update, built once per stream.
    ///
    /// When the table has no key, or every column is a key column, there is
    /// nothing to update and a plain INSERT is returned instead; a duplicate
    /// then fails as an ordinary statement error.
    pub fn native_upsert(
        &self,
        columns: &ColumnSet,
        metadata: &TableMetadata,
    ) -> Result<Statement, ConfigError> {
        match self.dialect {
            Dialect::PostgreSql => Ok(self.on_conflict(columns, metadata)),
            Dialect::MySql => Ok(self.on_duplicate_key(columns, metadata)),
            Dialect::Ansi => Err(ConfigError::NativeUpsertUnsupported(
                self.dialect.to_string(),
            )),
        }
    }

    /// PostgreSQL: `ON CONFLICT (<target>) DO UPDATE SET c = EXCLUDED.c`.
    ///
    /// The conflict target is the primary key, or the first unique group for
    /// tables without one.
    fn on_conflict(&self, columns: &ColumnSet, metadata: &TableMetadata) -> Statement {
        let insert = self.insert(columns);
        let target = if metadata.primary_key().is_empty() {
            metadata.unique_groups().first()
        } else {
            Some(metadata.primary_key())
        };
        let Some(target) = target else {
            return insert;
        };

        let assignments: Vec<String> = columns
            .columns()
            .iter()
            .filter(|c| !target.contains(c))
            .map(|c| {
                let ident = self.dialect.quote_ident(c);
                format!("{ident} = EXCLUDED.{ident}")
            })
            .collect();
        if assignments.is_empty() {
            return insert;
        }

        Statement {
            kind: StatementKind::Upsert,
            sql: format!(
                "{} ON CONFLICT ({}) DO UPDATE SET {}",
                insert.sql,
                self.quoted_list(&target.columns),
                assignments.join(", ")
            ),
            slots: insert.slots,
        }
    }

    /// MySQL: `ON DUPLICATE KEY UPDATE c = ?` over every non-key column.
    fn on_duplicate_key(&self, columns: &ColumnSet, metadata: &TableMetadata) -> Statement {
        let mut statement = self.insert(columns);
        let is_key = |c: &str| {
            metadata.primary_key().contains(c)
                || metadata.unique_groups().iter().any(|g| g.contains(c))
        };
        let updated: Vec<String> = columns
            .columns()
            .iter()
            .filter(|c| !is_key(c.as_str()))
            .cloned()
            .collect();
        let has_key = !metadata.primary_key().is_empty() || !metadata.unique_groups().is_empty();
        if updated.is_empty() || !has_key {
            return statement;
        }

        let assignments: Vec<String> = updated
            .iter()
            .map(|c| format!("{} = ?", self.dialect.quote_ident(c)))
            .collect();
        statement.kind = StatementKind::Upsert;
        statement.sql = format!(
            "{} ON DUPLICATE KEY UPDATE {}",
            statement.sql,
            assignments.join(", ")
        );
        statement.slots.extend(updated);
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upsert_core::{ColumnDefinition, Record, SqlType, TableRef};

    fn metadata(pk: &[&str], unique: &[&[&str]]) -> TableMetadata {
        TableMetadata::new(
            TableRef::new(Some("public".to_string()), "users"),
            vec![
                ColumnDefinition::new("id", SqlType::Integer),
                ColumnDefinition::new("email", SqlType::String),
                ColumnDefinition::new("name", SqlType::String),
            ],
            KeyGroup::primary(pk.iter().map(|s| s.to_string()).collect()),
            unique
                .iter()
                .enumerate()
                .map(|(i, cols)| {
                    KeyGroup::new(
                        format!("uq_{i}"),
                        cols.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn fields(json: &str) -> RecordFields {
        Record::from_json_str(json).parse().unwrap()
    }

    fn all_columns() -> ColumnSet {
        ColumnSet::new(["id", "email", "name"])
    }

    #[test]
    fn test_insert_postgres() {
        let meta = metadata(&["id"], &[]);
        let stmt = StatementBuilder::new(Dialect::PostgreSql, &meta).insert(&all_columns());
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "public"."users" ("id", "email", "name") VALUES ($1, $2, $3)"#
        );
        assert_eq!(stmt.slots, vec!["id", "email", "name"]);
        assert_eq!(stmt.kind, StatementKind::Insert);
    }

    #[test]
    fn test_update_by_primary_key() {
        let meta = metadata(&["id"], &[]);
        let stmt = StatementBuilder::new(Dialect::PostgreSql, &meta)
            .update(
                &all_columns(),
                &["id".to_string()],
                &fields(r#"{"id": 5, "email": "a@b", "name": "x"}"#),
            )
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "public"."users" SET "email" = $1, "name" = $2 WHERE "id" = $3"#
        );
        assert_eq!(stmt.slots, vec!["email", "name", "id"]);
    }

    #[test]
    fn test_update_absent_key_value_uses_is_null() {
        let meta = metadata(&["id"], &[&["email"]]);
        let keys = vec!["id".to_string(), "email".to_string()];
        let record = fields(r#"{"id": 5, "email": null, "name": "x"}"#);

        let mysql = StatementBuilder::new(Dialect::MySql, &meta)
            .update(&all_columns(), &keys, &record)
            .unwrap();
        assert_eq!(
            mysql.sql,
            "UPDATE `public`.`users` SET `name` = ? WHERE `id` = ? AND `email` IS NULL"
        );
        assert_eq!(mysql.slots, vec!["name", "id"]);

        let ansi = StatementBuilder::new(Dialect::Ansi, &meta)
            .update(&all_columns(), &keys, &record)
            .unwrap();
        assert_eq!(
            ansi.sql,
            r#"UPDATE "public"."users" SET "name" = ? WHERE "id" = ?"#
        );
    }

    #[test]
    fn test_update_pure_key_set_is_none() {
        let meta = metadata(&["id"], &[]);
        let set = ColumnSet::new(["id"]);
        let stmt = StatementBuilder::new(Dialect::PostgreSql, &meta).update(
            &set,
            &["id".to_string()],
            &fields(r#"{"id": 1}"#),
        );
        assert!(stmt.is_none());
    }

    #[test]
    fn test_probe() {
        let meta = metadata(&["id"], &[&["email", "name"]]);
        let builder = StatementBuilder::new(Dialect::PostgreSql, &meta);
        let group = &meta.unique_groups()[0];

        let stmt = builder
            .probe(group, &fields(r#"{"email": "a@b"}"#))
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "email" FROM "public"."users" WHERE "email" = $1 AND "name" IS NULL"#
        );
        assert_eq!(stmt.slots, vec!["email"]);

        assert!(builder.probe(group, &fields(r#"{"id": 1}"#)).is_none());
        assert!(builder
            .probe(&KeyGroup::primary(vec![]), &fields(r#"{"id": 1}"#))
            .is_none());
    }

    #[test]
    fn test_native_upsert_postgres() {
        let meta = metadata(&["id"], &[&["email"]]);
        let stmt = StatementBuilder::new(Dialect::PostgreSql, &meta)
            .native_upsert(&all_columns(), &meta)
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "public"."users" ("id", "email", "name") VALUES ($1, $2, $3) ON CONFLICT ("id") DO UPDATE SET "email" = EXCLUDED."email", "name" = EXCLUDED."name""#
        );
        assert_eq!(stmt.kind, StatementKind::Upsert);
        assert_eq!(stmt.slots.len(), 3);
    }

    #[test]
    fn test_native_upsert_postgres_unique_target() {
        let meta = metadata(&[], &[&["email"]]);
        let stmt = StatementBuilder::new(Dialect::PostgreSql, &meta)
            .native_upsert(&all_columns(), &meta)
            .unwrap();
        assert!(stmt.sql.ends_with(
            r#"ON CONFLICT ("email") DO UPDATE SET "id" = EXCLUDED."id", "name" = EXCLUDED."name""#
        ));
    }

    #[test]
    fn test_native_upsert_mysql() {
        let meta = metadata(&["id"], &[&["email"]]);
        let stmt = StatementBuilder::new(Dialect::MySql, &meta)
            .native_upsert(&all_columns(), &meta)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `public`.`users` (`id`, `email`, `name`) VALUES (?, ?, ?) ON DUPLICATE KEY UPDATE `name` = ?"
        );
        assert_eq!(stmt.slots, vec!["id", "email", "name", "name"]);
    }

    #[test]
    fn test_native_upsert_pure_key_degrades_to_insert() {
        let meta = metadata(&["id"], &[]);
        let set = ColumnSet::new(["id"]);
        for dialect in [Dialect::PostgreSql, Dialect::MySql] {
            let stmt = StatementBuilder::new(dialect, &meta)
                .native_upsert(&set, &meta)
                .unwrap();
            assert_eq!(stmt.kind, StatementKind::Insert);
            assert!(!stmt.sql.contains("UPDATE"));
        }
    }

    #[test]
    fn test_native_upsert_ansi_unsupported() {
        let meta = metadata(&["id"], &[]);
        let err = StatementBuilder::new(Dialect::Ansi, &meta)
            .native_upsert(&all_columns(), &meta)
            .unwrap_err();
        assert_eq!(err, ConfigError::NativeUpsertUnsupported("ansi".to_string()));
    }
}
