//! Input records.

use crate::error::InputError;
use serde_json::{Map, Value};

/// One input document as handed to the engine.
///
/// The content is kept as raw bytes and parsed once per record into
/// [`RecordFields`], which every engine stage shares.
#[derive(Debug, Clone)]
pub struct Record {
    content: Result<Vec<u8>, String>,
}

impl Record {
    /// A record backed by raw JSON bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Ok(bytes.into()),
        }
    }

    /// A record backed by JSON text.
    pub fn from_json_str(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// A record whose content could not be acquired.
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self {
            content: Err(reason.into()),
        }
    }

    /// Raw content, if it was readable.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref().ok()
    }

    /// Parse the content into a field map.
    pub fn parse(&self) -> Result<RecordFields, InputError> {
        let bytes = self
            .content
            .as_ref()
            .map_err(|reason| InputError::Unreadable(reason.clone()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(InputError::Unreadable("empty content".to_string()));
        }

        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(RecordFields { fields: map }),
            Ok(other) => Err(InputError::NotAnObject(json_kind(&other))),
            Err(e) => Err(InputError::Malformed(e.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parsed fields of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    fields: Map<String, Value>,
}

impl RecordFields {
    /// Wrap an already-parsed object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw value of a field; `None` when the key is absent.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Whether the key appears in the record at all (null included).
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Whether the field is present with a non-null value.
    pub fn has_value(&self, column: &str) -> bool {
        matches!(self.fields.get(column), Some(v) if !v.is_null())
    }

    /// Field names in the record.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
