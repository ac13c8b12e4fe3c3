//! SQL dialects.
//!
//! A dialect decides identifier quoting, placeholder syntax, whether absent
//! key values can be matched with `IS NULL`, and which native insert-or-update
//! syntax (if any) exists.

use std::fmt;
use upsert_core::TableRef;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL: `"ident"`, `$n`, `ON CONFLICT … DO UPDATE`
    PostgreSql,
    /// MySQL: `` `ident` ``, `?`, `ON DUPLICATE KEY UPDATE`
    MySql,
    /// Conservative ANSI SQL: `"ident"`, `?`, no native upsert, absent key
    /// values are left out of predicates instead of matched with `IS NULL`
    Ansi,
}

impl Dialect {
    /// Quote one identifier, doubling embedded quote characters.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::PostgreSql | Dialect::Ansi => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Schema-qualified, quoted table name.
    pub fn qualified_table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&table.name)
            ),
            None => self.quote_ident(&table.name),
        }
    }

    /// Placeholder for the parameter at 1-based `position`.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::PostgreSql => format!("${position}"),
            Dialect::MySql | Dialect::Ansi => "?".to_string(),
        }
    }

    /// Whether an absent key value is matched with `IS NULL`.
    pub fn matches_null_keys(&self) -> bool {
        !matches!(self, Dialect::Ansi)
    }

    /// Whether the dialect has a single-statement insert-or-update.
    pub fn supports_native_upsert(&self) -> bool {
        !matches!(self, Dialect::Ansi)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::PostgreSql => f.write_str("postgresql"),
            Dialect::MySql => f.write_str("mysql"),
            Dialect::Ansi => f.write_str("ansi"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(Dialect::PostgreSql.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySql.quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_qualified_table() {
        let table = TableRef::new(Some("app".to_string()), "users");
        assert_eq!(
            Dialect::PostgreSql.qualified_table(&table),
            "\"app\".\"users\""
        );
        assert_eq!(Dialect::MySql.qualified_table(&table), "`app`.`users`");
        let bare = TableRef::new(None, "users");
        assert_eq!(Dialect::Ansi.qualified_table(&bare), "\"users\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::PostgreSql.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
    }
}
