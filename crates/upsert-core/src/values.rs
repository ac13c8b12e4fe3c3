//! Typed parameter values produced by the Value Marshaller.
//!
//! A `BindValue` is dialect-neutral: each driver crate converts it into its
//! own wire representation (`ToSql` for PostgreSQL, `mysql_async::Value` for
//! MySQL). Nulls carry their declared type so drivers can bind a typed null.

use crate::decimal::ExactDecimal;
use crate::types::SqlType;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// One bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// SQL NULL of the declared type
    Null(SqlType),
    /// Exact decimal (INTEGER and NUMERIC columns)
    Decimal(ExactDecimal),
    /// Parsed calendar date
    Date(NaiveDate),
    /// Date forwarded to the database as the text supplied
    DateText(String),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp, UTC when the input carried an offset
    Timestamp(NaiveDateTime),
    /// Character data
    Text(String),
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Native JSON document
    Json(serde_json::Value),
    /// JSON document serialized to text
    JsonText(String),
    /// Binary large object
    Blob(Vec<u8>),
    /// Binary data streamed into a binary column
    BinaryStream(Vec<u8>),
}

impl BindValue {
    /// Whether this is a SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null(_))
    }

    /// Short kind label, safe to log without leaking the value.
    pub fn kind(&self) -> &'static str {
        match self {
            BindValue::Null(_) => "null",
            BindValue::Decimal(_) => "decimal",
            BindValue::Date(_) | BindValue::DateText(_) => "date",
            BindValue::Time(_) => "time",
            BindValue::Timestamp(_) => "timestamp",
            BindValue::Text(_) => "text",
            BindValue::Bool(_) => "bool",
            BindValue::Long(_) => "long",
            BindValue::Float(_) => "float",
            BindValue::Double(_) => "double",
            BindValue::Json(_) | BindValue::JsonText(_) => "json",
            BindValue::Blob(_) => "blob",
            BindValue::BinaryStream(_) => "binary",
        }
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null(ty) => write!(f, "NULL::{ty}"),
            BindValue::Decimal(d) => write!(f, "{d}"),
            BindValue::Date(d) => write!(f, "{d}"),
            BindValue::DateText(s) | BindValue::Text(s) | BindValue::JsonText(s) => {
                write!(f, "'{s}'")
            }
            BindValue::Time(t) => write!(f, "{t}"),
            BindValue::Timestamp(ts) => write!(f, "{ts}"),
            BindValue::Bool(b) => write!(f, "{b}"),
            BindValue::Long(i) => write!(f, "{i}"),
            BindValue::Float(v) => write!(f, "{v}"),
            BindValue::Double(v) => write!(f, "{v}"),
            BindValue::Json(v) => write!(f, "{v}"),
            BindValue::Blob(b) | BindValue::BinaryStream(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_display_keeps_type() {
        assert_eq!(BindValue::Null(SqlType::Date).to_string(), "NULL::DATE");
        assert!(BindValue::Null(SqlType::Json).is_null());
    }

    #[test]
    fn test_binary_display_hides_content() {
        let v = BindValue::BinaryStream(vec![1, 2, 3]);
        assert_eq!(v.to_string(), "<3 bytes>");
        assert_eq!(v.kind(), "binary");
    }
}
