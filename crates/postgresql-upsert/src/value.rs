//! BindValue → PostgreSQL wire encoding.
//!
//! Statements are prepared, so the server decides each parameter's type from
//! the column it is compared with or assigned to. [`PgParam`] therefore
//! accepts every type and picks the encoding from the type the server asked
//! for: an exact decimal bound to an `int4` column is sent as `int4`, the same
//! decimal bound to `numeric` keeps every digit.

use bytes::{BufMut, BytesMut};
use chrono::{NaiveDate, TimeZone, Utc};
use postgres_types::{to_sql_checked, IsNull, Kind, ToSql, Type};
use std::error::Error;
use thiserror::Error;
use upsert_engine::{BindValue, ExactDecimal};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// Largest display scale PostgreSQL NUMERIC can carry.
const NUMERIC_MAX_SCALE: usize = 0x3FFF;
const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;

/// A value that cannot be encoded for the requested column type.
#[derive(Error, Debug)]
pub enum ParamError {
    #[error("cannot bind {kind} value to a column of type {ty}")]
    Unsupported { kind: &'static str, ty: String },

    #[error("value {value} is out of range for type {ty}")]
    OutOfRange { value: String, ty: String },

    #[error("numeric value {0} exceeds PostgreSQL NUMERIC limits")]
    NumericLimits(String),
}

fn unsupported(value: &BindValue, ty: &Type) -> BoxError {
    Box::new(ParamError::Unsupported {
        kind: value.kind(),
        ty: ty.name().to_string(),
    })
}

fn out_of_range(value: impl ToString, ty: &Type) -> BoxError {
    Box::new(ParamError::OutOfRange {
        value: value.to_string(),
        ty: ty.name().to_string(),
    })
}

/// Statement parameter borrowed from a [`BindValue`].
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a BindValue);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            BindValue::Null(_) => Ok(IsNull::Yes),
            BindValue::Decimal(d) => decimal_to_sql(d, ty, out),
            BindValue::Date(d) => {
                if is_text(ty) {
                    d.to_string().to_sql_checked(ty, out)
                } else {
                    d.to_sql_checked(ty, out)
                }
            }
            BindValue::DateText(s) => {
                if *ty == Type::DATE {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out)
                } else {
                    text_to_sql(s, ty, out)
                }
            }
            BindValue::Time(t) => t.to_sql_checked(ty, out),
            BindValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => Utc.from_utc_datetime(ts).to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                _ => ts.to_sql_checked(ty, out),
            },
            BindValue::Text(s) => text_to_sql(s, ty, out),
            BindValue::Bool(b) => b.to_sql_checked(ty, out),
            BindValue::Long(i) => integer_to_sql(*i, ty, out)
                .unwrap_or_else(|| Err(unsupported(self.0, ty))),
            BindValue::Float(f) => match *ty {
                Type::FLOAT8 => f64::from(*f).to_sql(ty, out),
                Type::NUMERIC => decimal_text_to_sql(&f.to_string(), ty, out),
                _ => f.to_sql_checked(ty, out),
            },
            BindValue::Double(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => decimal_text_to_sql(&f.to_string(), ty, out),
                _ => f.to_sql_checked(ty, out),
            },
            BindValue::Json(v) => {
                if is_text(ty) {
                    v.to_string().to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            BindValue::JsonText(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                _ => text_to_sql(s, ty, out),
            },
            BindValue::Blob(b) | BindValue::BinaryStream(b) => b.as_slice().to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::UUID {
        return Uuid::parse_str(s)?.to_sql(ty, out);
    }
    if matches!(ty.kind(), Kind::Enum(_)) {
        // Enum labels travel as their text
        out.put_slice(s.as_bytes());
        return Ok(IsNull::No);
    }
    s.to_sql_checked(ty, out)
}

/// Integer encodings; `None` when the column type is not numeric.
fn integer_to_sql(value: i64, ty: &Type, out: &mut BytesMut) -> Option<Result<IsNull, BoxError>> {
    let result = match *ty {
        Type::INT8 => value.to_sql(ty, out),
        Type::INT4 => match i32::try_from(value) {
            Ok(v) => v.to_sql(ty, out),
            Err(_) => Err(out_of_range(value, ty)),
        },
        Type::INT2 => match i16::try_from(value) {
            Ok(v) => v.to_sql(ty, out),
            Err(_) => Err(out_of_range(value, ty)),
        },
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::NUMERIC => decimal_text_to_sql(&value.to_string(), ty, out),
        _ => return None,
    };
    Some(result)
}

fn decimal_text_to_sql(text: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    decimal_to_sql(&ExactDecimal::parse(text)?, ty, out)
}

fn decimal_to_sql(d: &ExactDecimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::NUMERIC => {
            encode_numeric(d, out)?;
            Ok(IsNull::No)
        }
        Type::INT2 | Type::INT4 | Type::INT8 => {
            let value = d.to_i64().ok_or_else(|| out_of_range(d, ty))?;
            integer_to_sql(value, ty, out).unwrap_or_else(|| Err(out_of_range(d, ty)))
        }
        Type::FLOAT4 => (d.to_f64() as f32).to_sql(ty, out),
        Type::FLOAT8 => d.to_f64().to_sql(ty, out),
        _ if is_text(ty) => d.to_string().to_sql(ty, out),
        _ => Err(Box::new(ParamError::Unsupported {
            kind: "decimal",
            ty: ty.name().to_string(),
        })),
    }
}

/// Binary NUMERIC: ndigits, weight, sign, dscale, then base-10000 digits.
///
/// Digit groups are aligned on the decimal point; `weight` is the power of
/// 10000 of the first group. Leading and trailing zero groups are dropped,
/// `dscale` keeps the scale that was supplied.
pub fn encode_numeric(d: &ExactDecimal, out: &mut BytesMut) -> Result<(), ParamError> {
    let integer = d.integer_digits();
    let fraction = d.fraction_digits();
    let scale = fraction.len();
    if scale > NUMERIC_MAX_SCALE {
        return Err(ParamError::NumericLimits(d.to_string()));
    }

    let int_pad = (4 - integer.len() % 4) % 4;
    let frac_pad = (4 - fraction.len() % 4) % 4;
    let mut digits = String::with_capacity(int_pad + integer.len() + fraction.len() + frac_pad);
    digits.extend(std::iter::repeat('0').take(int_pad));
    digits.push_str(integer);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(frac_pad));

    let groups: Vec<i16> = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0')))
        .collect();
    let int_groups = (int_pad + integer.len()) / 4;

    let leading = groups.iter().take_while(|g| **g == 0).count();
    let trailing = groups[leading..].iter().rev().take_while(|g| **g == 0).count();
    let significant = &groups[leading..groups.len() - trailing];

    let too_large = |_| ParamError::NumericLimits(d.to_string());
    let ndigits = i16::try_from(significant.len()).map_err(too_large)?;
    let weight = if significant.is_empty() {
        0
    } else {
        i16::try_from(int_groups as i64 - 1 - leading as i64).map_err(too_large)?
    };
    let sign = if d.is_negative() { NUMERIC_NEG } else { NUMERIC_POS };

    out.reserve(8 + 2 * significant.len());
    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(scale as u16);
    for group in significant {
        out.put_i16(*group);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use postgres_types::FromSql;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use upsert_engine::SqlType;

    fn numeric_bytes(text: &str) -> BytesMut {
        let mut out = BytesMut::new();
        encode_numeric(&ExactDecimal::parse(text).unwrap(), &mut out).unwrap();
        out
    }

    fn header(buf: &[u8]) -> (i16, i16, u16, u16) {
        (
            i16::from_be_bytes([buf[0], buf[1]]),
            i16::from_be_bytes([buf[2], buf[3]]),
            u16::from_be_bytes([buf[4], buf[5]]),
            u16::from_be_bytes([buf[6], buf[7]]),
        )
    }

    #[test]
    fn test_numeric_decodes_back() {
        for text in [
            "0",
            "1",
            "-1",
            "10000",
            "12345.6789",
            "-0.0001",
            "0.5",
            "100.25",
            "79228162514264337593543950335",
            "-1.000",
        ] {
            let buf = numeric_bytes(text);
            let decoded = Decimal::from_sql(&Type::NUMERIC, &buf).unwrap();
            assert_eq!(decoded, Decimal::from_str(text).unwrap(), "{text}");
        }
    }

    #[test]
    fn test_numeric_header() {
        assert_eq!(header(&numeric_bytes("0")), (0, 0, NUMERIC_POS, 0));
        assert_eq!(header(&numeric_bytes("0.00")), (0, 0, NUMERIC_POS, 2));
        assert_eq!(header(&numeric_bytes("12345.6789")), (3, 1, NUMERIC_POS, 4));
        assert_eq!(header(&numeric_bytes("-0.0001")), (1, -1, NUMERIC_NEG, 4));
        assert_eq!(header(&numeric_bytes("0.00000001")), (1, -2, NUMERIC_POS, 8));
        assert_eq!(header(&numeric_bytes("10000")), (1, 1, NUMERIC_POS, 0));
    }

    #[test]
    fn test_numeric_beyond_64_bits() {
        let text = "123456789012345678901234567890.123456789";
        let buf = numeric_bytes(text);
        // 30 integer digits: 8 groups, weight 7; 9 fraction digits: 3 groups
        assert_eq!(header(&buf), (11, 7, NUMERIC_POS, 9));
        let groups: Vec<i16> = buf[8..]
            .chunks(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(
            groups,
            vec![12, 3456, 7890, 1234, 5678, 9012, 3456, 7890, 1234, 5678, 9000]
        );
    }

    #[test]
    fn test_decimal_follows_column_type() {
        let value = BindValue::Decimal(ExactDecimal::parse("42").unwrap());
        let mut out = BytesMut::new();
        PgParam(&value).to_sql_checked(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &42i32.to_be_bytes());

        let mut out = BytesMut::new();
        PgParam(&value).to_sql_checked(&Type::INT8, &mut out).unwrap();
        assert_eq!(&out[..], &42i64.to_be_bytes());

        let big = BindValue::Decimal(ExactDecimal::parse("3000000000").unwrap());
        let mut out = BytesMut::new();
        assert!(PgParam(&big).to_sql_checked(&Type::INT4, &mut out).is_err());

        let fractional = BindValue::Decimal(ExactDecimal::parse("1.5").unwrap());
        let mut out = BytesMut::new();
        assert!(PgParam(&fractional)
            .to_sql_checked(&Type::INT8, &mut out)
            .is_err());
    }

    #[test]
    fn test_null_is_null_for_any_type() {
        let value = BindValue::Null(SqlType::Json);
        let mut out = BytesMut::new();
        let is_null = PgParam(&value).to_sql_checked(&Type::JSONB, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_text_to_uuid_column() {
        let value = BindValue::Text("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string());
        let mut out = BytesMut::new();
        PgParam(&value).to_sql_checked(&Type::UUID, &mut out).unwrap();
        assert_eq!(out.len(), 16);

        let bad = BindValue::Text("not-a-uuid".to_string());
        let mut out = BytesMut::new();
        assert!(PgParam(&bad).to_sql_checked(&Type::UUID, &mut out).is_err());
    }

    #[test]
    fn test_long_narrowing() {
        let value = BindValue::Long(70_000);
        let mut out = BytesMut::new();
        assert!(PgParam(&value).to_sql_checked(&Type::INT2, &mut out).is_err());
        let mut out = BytesMut::new();
        PgParam(&value).to_sql_checked(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &70_000i32.to_be_bytes());
    }

    #[test]
    fn test_wrong_type_is_error() {
        let value = BindValue::Bool(true);
        let mut out = BytesMut::new();
        assert!(PgParam(&value).to_sql_checked(&Type::INT4, &mut out).is_err());
    }
}
