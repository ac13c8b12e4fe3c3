//! Value Marshaller: JSON field value → typed statement parameter.
//!
//! Binding is a table lookup from declared [`SqlType`] to a [`Binder`]
//! function. Every dialect starts from the same table and overrides the
//! leaves that differ (DATE, JSON, BLOB). Callers may register additional
//! overrides without touching any call site.
//!
//! Nulls never reach a binder: an absent field or a JSON `null` binds
//! [`BindValue::Null`] of the declared type for every type.

use crate::dialect::Dialect;
use crate::statement::Statement;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::collections::HashMap;
use upsert_core::{BindValue, ExactDecimal, RecordFields, SqlType, TableMetadata, ValueError};

/// Converts one non-null JSON value; the error is the reason text.
pub type Binder = fn(&Value) -> Result<BindValue, String>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Declared type → binder lookup table.
#[derive(Debug, Clone)]
pub struct BinderRegistry {
    binders: HashMap<SqlType, Binder>,
}

impl BinderRegistry {
    /// Binders shared by every dialect.
    pub fn common() -> Self {
        let mut binders: HashMap<SqlType, Binder> = HashMap::new();
        binders.insert(SqlType::Integer, bind_decimal);
        binders.insert(SqlType::Numeric, bind_decimal);
        binders.insert(SqlType::Date, bind_date);
        binders.insert(SqlType::Time, bind_time);
        binders.insert(SqlType::Timestamp, bind_timestamp);
        binders.insert(SqlType::String, bind_string);
        binders.insert(SqlType::NVarchar, bind_nvarchar);
        binders.insert(SqlType::Boolean, bind_boolean);
        binders.insert(SqlType::Long, bind_long);
        binders.insert(SqlType::Float, bind_float);
        binders.insert(SqlType::Double, bind_double);
        binders.insert(SqlType::Json, bind_json_text);
        binders.insert(SqlType::Blob, bind_blob);
        Self { binders }
    }

    /// Binders for a dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let mut registry = Self::common();
        match dialect {
            Dialect::PostgreSql => {
                registry.register(SqlType::Json, bind_json_native);
            }
            Dialect::MySql => {
                registry.register(SqlType::Date, bind_date_text);
                registry.register(SqlType::Blob, bind_binary_stream);
            }
            Dialect::Ansi => {}
        }
        registry
    }

    /// Install a binder, returning the one it replaces.
    pub fn register(&mut self, sql_type: SqlType, binder: Binder) -> Option<Binder> {
        self.binders.insert(sql_type, binder)
    }

    /// Bind one field value for a column of the declared type.
    pub fn bind(
        &self,
        column: &str,
        sql_type: SqlType,
        raw: Option<&Value>,
    ) -> Result<BindValue, ValueError> {
        let value = match raw {
            None | Some(Value::Null) => return Ok(BindValue::Null(sql_type)),
            Some(value) => value,
        };
        let binder = self.binders.get(&sql_type).ok_or_else(|| {
            ValueError::new(column, sql_type, "no binder registered for declared type")
        })?;
        binder(value).map_err(|reason| ValueError::new(column, sql_type, reason))
    }

    /// Bind every parameter slot of a statement, in slot order.
    ///
    /// Slot columns missing from the record bind a typed null.
    pub fn bind_statement(
        &self,
        statement: &Statement,
        fields: &RecordFields,
        metadata: &TableMetadata,
    ) -> Result<Vec<BindValue>, ValueError> {
        let mut params = Vec::with_capacity(statement.slots.len());
        for column in &statement.slots {
            let sql_type = metadata.column_type(column).ok_or_else(|| {
                ValueError::new(column.as_str(), SqlType::String, "column has no declared type")
            })?;
            params.push(self.bind(column, sql_type, fields.get(column))?);
        }
        Ok(params)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Numeric binders
// ============================================================================

fn bind_decimal(value: &Value) -> Result<BindValue, String> {
    let decimal = match value {
        Value::Number(n) => ExactDecimal::from_json_number(n),
        Value::String(s) => ExactDecimal::parse(s),
        other => return Err(format!("expected a number, got {}", describe(other))),
    };
    decimal.map(BindValue::Decimal).map_err(|e| e.to_string())
}

fn bind_long(value: &Value) -> Result<BindValue, String> {
    if let Some(i) = value.as_i64() {
        return Ok(BindValue::Long(i));
    }
    let decimal = match value {
        Value::Number(n) => ExactDecimal::from_json_number(n),
        Value::String(s) => ExactDecimal::parse(s),
        other => return Err(format!("expected an integer, got {}", describe(other))),
    }
    .map_err(|e| e.to_string())?;
    decimal
        .to_i64()
        .map(BindValue::Long)
        .ok_or_else(|| format!("{decimal} is not a 64-bit integer"))
}

fn parse_float(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable as a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number"))?,
        other => return Err(format!("expected a number, got {}", describe(other))),
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err("non-finite floats are not supported".to_string())
    }
}

fn bind_float(value: &Value) -> Result<BindValue, String> {
    let parsed = parse_float(value)?;
    let narrowed = parsed as f32;
    if narrowed.is_finite() {
        Ok(BindValue::Float(narrowed))
    } else {
        Err(format!("{parsed} is out of range for a 32-bit float"))
    }
}

fn bind_double(value: &Value) -> Result<BindValue, String> {
    parse_float(value).map(BindValue::Double)
}

fn bind_boolean(value: &Value) -> Result<BindValue, String> {
    match value {
        Value::Bool(b) => Ok(BindValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(BindValue::Bool(false)),
            Some(1) => Ok(BindValue::Bool(true)),
            _ => Err(format!("{n} is not a boolean")),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(BindValue::Bool(true)),
            "false" | "f" | "no" | "n" | "0" => Ok(BindValue::Bool(false)),
            _ => Err(format!("'{s}' is not a boolean")),
        },
        other => Err(format!("expected a boolean, got {}", describe(other))),
    }
}

// ============================================================================
// Temporal binders
// ============================================================================

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, String> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| format!("expected a {what} string, got {}", describe(value)))
}

fn bind_date(value: &Value) -> Result<BindValue, String> {
    let s = expect_str(value, "date")?;
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(BindValue::Date(date));
    }
    parse_timestamp(s)
        .map(|ts| BindValue::Date(ts.date()))
        .map_err(|_| format!("'{s}' is not a date (expected YYYY-MM-DD)"))
}

fn bind_date_text(value: &Value) -> Result<BindValue, String> {
    expect_str(value, "date").map(|s| BindValue::DateText(s.to_string()))
}

fn bind_time(value: &Value) -> Result<BindValue, String> {
    let s = expect_str(value, "time")?;
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .map(BindValue::Time)
        .ok_or_else(|| format!("'{s}' is not a time of day (expected HH:MM:SS)"))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    if let Some(ts) = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("'{s}' is not a timestamp"))
}

fn bind_timestamp(value: &Value) -> Result<BindValue, String> {
    match value {
        // Epoch milliseconds
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| BindValue::Timestamp(dt.naive_utc()))
            .ok_or_else(|| format!("{n} is not a valid epoch-millisecond timestamp")),
        Value::String(s) => parse_timestamp(s.trim()).map(BindValue::Timestamp),
        other => Err(format!("expected a timestamp, got {}", describe(other))),
    }
}

// ============================================================================
// Character binders
// ============================================================================

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bind_string(value: &Value) -> Result<BindValue, String> {
    Ok(BindValue::Text(text_of(value)))
}

fn bind_nvarchar(value: &Value) -> Result<BindValue, String> {
    unescape_backslashes(&text_of(value)).map(BindValue::Text)
}

/// Reverse backslash escaping (`\n`, `\t`, `\\`, `\uXXXX`, …).
///
/// Unknown escapes are kept as written.
pub fn unescape_backslashes(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid unicode escape '\\u{hex}'"))?;
                out.push(decoded);
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

// ============================================================================
// JSON binders
// ============================================================================

/// Strings holding serialized JSON are bound as the document they contain.
fn json_document(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn bind_json_native(value: &Value) -> Result<BindValue, String> {
    Ok(BindValue::Json(json_document(value)))
}

fn bind_json_text(value: &Value) -> Result<BindValue, String> {
    serde_json::to_string(&json_document(value))
        .map(BindValue::JsonText)
        .map_err(|e| e.to_string())
}

// ============================================================================
// Binary binders
// ============================================================================

fn decode_bytes(value: &Value) -> Result<Vec<u8>, String> {
    match value {
        Value::String(s) => BASE64
            .decode(s.trim())
            .map_err(|e| format!("invalid base64 content: {e}")),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| format!("{item} is not a byte value"))
            })
            .collect(),
        other => Err(format!(
            "expected base64 text or an array of bytes, got {}",
            describe(other)
        )),
    }
}

fn bind_blob(value: &Value) -> Result<BindValue, String> {
    decode_bytes(value).map(BindValue::Blob)
}

fn bind_binary_stream(value: &Value) -> Result<BindValue, String> {
    decode_bytes(value).map(BindValue::BinaryStream)
}
