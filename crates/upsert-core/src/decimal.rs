//! Arbitrary-precision decimal values.
//!
//! JSON numbers and numeric strings destined for INTEGER/NUMERIC columns are
//! kept as exact base-10 digit strings. No step between the input document
//! and the driver goes through `f64`.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Largest exponent accepted in scientific notation ("1e400" is already absurd
/// for any SQL NUMERIC; this only bounds the allocation).
const MAX_EXPONENT: i64 = 4096;

/// Error returned when text is not a finite decimal number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{input}' is not a valid decimal number")]
pub struct DecimalParseError {
    input: String,
}

/// Exact decimal number.
///
/// Invariants: `integer` has no leading zeros (empty means zero), `fraction`
/// keeps every digit supplied (its length is the scale), and zero is never
/// negative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactDecimal {
    negative: bool,
    integer: String,
    fraction: String,
}

impl ExactDecimal {
    /// Parse plain (`-12.50`) or scientific (`1.2e3`) notation.
    pub fn parse(input: &str) -> Result<Self, DecimalParseError> {
        let err = || DecimalParseError {
            input: input.to_string(),
        };
        let s = input.trim();

        let (negative, rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(idx) => {
                let exponent: i64 = rest[idx + 1..].parse().map_err(|_| err())?;
                if exponent.unsigned_abs() > MAX_EXPONENT.unsigned_abs() {
                    return Err(err());
                }
                (&rest[..idx], exponent)
            }
            None => (rest, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let mut digits = format!("{int_part}{frac_part}");
        let mut point = int_part.len() as i64 + exponent;
        if point < 0 {
            digits.insert_str(0, &"0".repeat((-point) as usize));
            point = 0;
        }
        let point = point as usize;
        if point > digits.len() {
            digits.push_str(&"0".repeat(point - digits.len()));
        }

        let integer = digits[..point].trim_start_matches('0').to_string();
        let fraction = digits[point..].to_string();
        let is_zero = integer.is_empty() && fraction.bytes().all(|b| b == b'0');

        Ok(Self {
            negative: negative && !is_zero,
            integer,
            fraction,
        })
    }

    /// Build from a JSON number without an intermediate float.
    pub fn from_json_number(number: &serde_json::Number) -> Result<Self, DecimalParseError> {
        Self::parse(&number.to_string())
    }

    /// Whether the value is below zero.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Digits before the decimal point, without leading zeros ("" for zero).
    pub fn integer_digits(&self) -> &str {
        &self.integer
    }

    /// Digits after the decimal point, exactly as supplied.
    pub fn fraction_digits(&self) -> &str {
        &self.fraction
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> usize {
        self.fraction.len()
    }

    /// True when every fractional digit is zero.
    pub fn is_integral(&self) -> bool {
        self.fraction.bytes().all(|b| b == b'0')
    }

    /// The value as an `i64`, if it is integral and in range.
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integral() || self.integer.len() > 19 {
            return None;
        }
        let magnitude: i128 = if self.integer.is_empty() {
            0
        } else {
            self.integer.parse().ok()?
        };
        let value = if self.negative { -magnitude } else { magnitude };
        i64::try_from(value).ok()
    }

    /// Nearest `f64`; only for columns that are floating point anyway.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for ExactDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        if self.integer.is_empty() {
            f.write_str("0")?;
        } else {
            f.write_str(&self.integer)?;
        }
        if !self.fraction.is_empty() {
            write!(f, ".{}", self.fraction)?;
        }
        Ok(())
    }
}

impl FromStr for ExactDecimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ExactDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let d = ExactDecimal::parse("-0012.500").unwrap();
        assert!(d.is_negative());
        assert_eq!(d.integer_digits(), "12");
        assert_eq!(d.fraction_digits(), "500");
        assert_eq!(d.to_string(), "-12.500");
    }

    #[test]
    fn test_parse_beyond_i64() {
        let text = "123456789012345678901234567890.000000000000000000001";
        let d = ExactDecimal::parse(text).unwrap();
        assert_eq!(d.to_string(), text);
        assert_eq!(d.to_i64(), None);
    }

    #[test]
    fn test_parse_scientific() {
        assert_eq!(ExactDecimal::parse("1.25e3").unwrap().to_string(), "1250");
        assert_eq!(ExactDecimal::parse("125E-4").unwrap().to_string(), "0.0125");
        assert_eq!(ExactDecimal::parse("-5e0").unwrap().to_string(), "-5");
    }

    #[test]
    fn test_negative_zero_normalized() {
        let d = ExactDecimal::parse("-0.00").unwrap();
        assert!(!d.is_negative());
        assert_eq!(d.to_string(), "0.00");
        assert_eq!(d.to_i64(), Some(0));
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in [
            "", "-", ".", "1.2.3", "abc", "1e", "NaN", "inf", "1e99999", "12a",
            "1e-9223372036854775808", "1e9223372036854775807",
        ] {
            assert!(ExactDecimal::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_to_i64_bounds() {
        assert_eq!(
            ExactDecimal::parse("9223372036854775807").unwrap().to_i64(),
            Some(i64::MAX)
        );
        assert_eq!(
            ExactDecimal::parse("-9223372036854775808").unwrap().to_i64(),
            Some(i64::MIN)
        );
        assert_eq!(
            ExactDecimal::parse("9223372036854775808").unwrap().to_i64(),
            None
        );
        assert_eq!(ExactDecimal::parse("4.5").unwrap().to_i64(), None);
        assert_eq!(ExactDecimal::parse("4.0").unwrap().to_i64(), Some(4));
    }

    #[test]
    fn test_from_json_number_keeps_text() {
        let value: serde_json::Value =
            serde_json::from_str("{\"price\": 98765432109876543210987654321}").unwrap();
        let number = match &value["price"] {
            serde_json::Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        };
        let d = ExactDecimal::from_json_number(number).unwrap();
        assert_eq!(d.to_string(), "98765432109876543210987654321");
    }
}
