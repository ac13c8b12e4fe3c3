//! Declared SQL types understood by the upsert engine.
//!
//! `SqlType` is the closed set of declared column types the Value Marshaller
//! can bind. Column metadata from any source (information schema queries,
//! static metadata files) is normalized into this set before the engine runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Declared type of a participating column.
///
/// # Mapping examples
///
/// ```text
/// int, smallint, integer      -> Integer
/// numeric(38,10), decimal     -> Numeric
/// bigint, int8                -> Long
/// varchar(255), text, uuid    -> String
/// nvarchar, nchar, ntext      -> NVarchar
/// timestamp, datetime         -> Timestamp
/// json, jsonb                 -> Json
/// bytea, blob, varbinary      -> Blob
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SqlType {
    /// Whole number bound as an exact decimal
    Integer,
    /// Exact numeric with arbitrary precision
    Numeric,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time (normalized to UTC when an offset is supplied)
    Timestamp,
    /// Character data
    String,
    /// National character data; input may carry backslash escapes
    NVarchar,
    /// Boolean
    Boolean,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE 754 float
    Float,
    /// 64-bit IEEE 754 float
    Double,
    /// JSON document
    Json,
    /// Binary data
    Blob,
}

impl SqlType {
    /// Every declared type, in dispatch-table order.
    pub const ALL: [SqlType; 13] = [
        SqlType::Integer,
        SqlType::Numeric,
        SqlType::Date,
        SqlType::Time,
        SqlType::Timestamp,
        SqlType::String,
        SqlType::NVarchar,
        SqlType::Boolean,
        SqlType::Long,
        SqlType::Float,
        SqlType::Double,
        SqlType::Json,
        SqlType::Blob,
    ];

    /// Canonical upper-case tag used in logs, payloads and metadata files.
    pub fn tag(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Numeric => "NUMERIC",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::String => "STRING",
            SqlType::NVarchar => "NVARCHAR",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Long => "LONG",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Json => "JSON",
            SqlType::Blob => "BLOB",
        }
    }

    /// Normalize a declared database type name into a `SqlType`.
    ///
    /// Length/precision suffixes such as `(255)` or `(10,2)` are ignored and
    /// matching is case-insensitive. Returns `None` for names that have no
    /// binding rule.
    pub fn from_declared(declared: &str) -> Option<SqlType> {
        let lowered = declared.trim().to_lowercase();
        let base = match lowered.find('(') {
            Some(idx) => lowered[..idx].trim_end(),
            None => lowered.as_str(),
        };
        let base = base.strip_suffix(" unsigned").unwrap_or(base);

        let ty = match base {
            "integer" | "int" | "int2" | "int4" | "smallint" | "tinyint" | "mediumint" => {
                SqlType::Integer
            }
            "numeric" | "decimal" | "number" => SqlType::Numeric,
            "long" | "bigint" | "int8" => SqlType::Long,
            "float" | "real" | "float4" => SqlType::Float,
            "double" | "double precision" | "float8" => SqlType::Double,
            "boolean" | "bool" | "bit" => SqlType::Boolean,
            "date" => SqlType::Date,
            "time" | "time without time zone" | "time with time zone" | "timetz" => SqlType::Time,
            "timestamp"
            | "timestamp without time zone"
            | "timestamp with time zone"
            | "timestamptz"
            | "datetime"
            | "datetime2" => SqlType::Timestamp,
            "string" | "text" | "varchar" | "character varying" | "char" | "character"
            | "bpchar" | "tinytext" | "mediumtext" | "longtext" | "uuid" | "enum" | "set"
            | "citext" => SqlType::String,
            "nvarchar" | "nchar" | "ntext" | "national character varying" => SqlType::NVarchar,
            "json" | "jsonb" => SqlType::Json,
            "blob" | "binary" | "varbinary" | "bytea" | "tinyblob" | "mediumblob" | "longblob"
            | "bytes" => SqlType::Blob,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SqlType::from_declared(s).ok_or_else(|| format!("unsupported declared type: {s}"))
    }
}

// Metadata files spell types the way the database does ("varchar(64)",
// "NVARCHAR", "bigint"), so (de)serialization goes through the declared form.

impl Serialize for SqlType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for SqlType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
