//! Conversion from [`BindValue`] to the MySQL wire value.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::Value;
use upsert_engine::BindValue;

/// Wrapper for a `mysql_async` parameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct MySqlValue(pub Value);

impl MySqlValue {
    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn as_inner(&self) -> &Value {
        &self.0
    }
}

// MySQL carries microseconds; leap-second nanos are clamped.
fn micros(nanos: u32) -> u32 {
    (nanos / 1000).min(999_999)
}

fn date(d: NaiveDate) -> Value {
    Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
}

fn datetime(ts: NaiveDateTime) -> Value {
    Value::Date(
        ts.year() as u16,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        micros(ts.nanosecond()),
    )
}

fn time(t: NaiveTime) -> Value {
    Value::Time(
        false,
        0,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        micros(t.nanosecond()),
    )
}

impl From<&BindValue> for MySqlValue {
    fn from(value: &BindValue) -> Self {
        let inner = match value {
            // The text protocol has no typed null
            BindValue::Null(_) => Value::NULL,
            // DECIMAL columns parse the literal text exactly
            BindValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
            BindValue::Date(d) => date(*d),
            BindValue::DateText(s) | BindValue::Text(s) | BindValue::JsonText(s) => {
                Value::Bytes(s.clone().into_bytes())
            }
            BindValue::Time(t) => time(*t),
            BindValue::Timestamp(ts) => datetime(*ts),
            BindValue::Bool(b) => Value::Int(i64::from(*b)),
            BindValue::Long(i) => Value::Int(*i),
            BindValue::Float(f) => Value::Float(*f),
            BindValue::Double(f) => Value::Double(*f),
            BindValue::Json(v) => Value::Bytes(v.to_string().into_bytes()),
            BindValue::Blob(b) | BindValue::BinaryStream(b) => Value::Bytes(b.clone()),
        };
        MySqlValue(inner)
    }
}

/// Positional parameters for one statement.
pub fn positional(params: &[BindValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| MySqlValue::from(p).into_inner())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use upsert_engine::{ExactDecimal, SqlType};

    #[test]
    fn test_decimal_is_sent_as_literal_text() {
        let d = ExactDecimal::parse("12345678901234567890.123456789").unwrap();
        let v = MySqlValue::from(&BindValue::Decimal(d));
        assert_eq!(
            v.into_inner(),
            Value::Bytes(b"12345678901234567890.123456789".to_vec())
        );
    }

    #[test]
    fn test_null_of_any_type() {
        for ty in SqlType::ALL {
            assert_eq!(MySqlValue::from(&BindValue::Null(ty)).0, Value::NULL);
        }
    }

    #[test]
    fn test_bool_as_tinyint() {
        assert_eq!(MySqlValue::from(&BindValue::Bool(true)).0, Value::Int(1));
        assert_eq!(MySqlValue::from(&BindValue::Bool(false)).0, Value::Int(0));
    }

    #[test]
    fn test_temporal_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 5, 9, 250_000)
            .unwrap();
        assert_eq!(
            MySqlValue::from(&BindValue::Timestamp(ts)).0,
            Value::Date(2024, 2, 29, 13, 5, 9, 250_000)
        );

        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(
            MySqlValue::from(&BindValue::Date(d)).0,
            Value::Date(1999, 12, 31, 0, 0, 0, 0)
        );

        let t = NaiveTime::from_hms_opt(23, 59, 58).unwrap();
        assert_eq!(
            MySqlValue::from(&BindValue::Time(t)).0,
            Value::Time(false, 0, 23, 59, 58, 0)
        );
    }

    #[test]
    fn test_date_text_passes_through() {
        let v = MySqlValue::from(&BindValue::DateText("2024-01-01".into()));
        assert_eq!(v.0, Value::Bytes(b"2024-01-01".to_vec()));
    }

    #[test]
    fn test_json_serialized() {
        let v = MySqlValue::from(&BindValue::Json(serde_json::json!({"a": [1, 2]})));
        assert_eq!(v.0, Value::Bytes(br#"{"a":[1,2]}"#.to_vec()));
    }

    #[test]
    fn test_positional_keeps_order() {
        let params = positional(&[
            BindValue::Long(7),
            BindValue::Text("x".into()),
            BindValue::Null(SqlType::String),
        ]);
        assert_eq!(
            params,
            vec![Value::Int(7), Value::Bytes(b"x".to_vec()), Value::NULL]
        );
    }
}
