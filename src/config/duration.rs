//! Duration parsing utilities.

use anyhow::Context;

/// Parse a timeout string like "500ms", "30s", "2m", "1h", "1500" into
/// milliseconds.
/// Supports:
/// - Plain numbers (interpreted as milliseconds): "1500"
/// - Milliseconds suffix: "500ms"
/// - Seconds suffix: "30s"
/// - Minutes suffix: "2m"
/// - Hours suffix: "1h"
pub fn parse_duration_to_millis(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    // "ms" must be checked before "m" and "s"
    if let Some(num_str) = s.strip_suffix("ms") {
        return num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid milliseconds value: {num_str}"));
    }
    let units = [
        ('h', 3_600_000u64, "hours"),
        ('m', 60_000, "minutes"),
        ('s', 1_000, "seconds"),
    ];
    for (suffix, factor, name) in units {
        if let Some(num_str) = s.strip_suffix(suffix) {
            let value: u64 = num_str
                .trim()
                .parse()
                .with_context(|| format!("Invalid {name} value: {num_str}"))?;
            return value
                .checked_mul(factor)
                .with_context(|| format!("Duration too large: {s}"));
        }
    }

    // No suffix - treat as milliseconds
    s.parse::<u64>()
        .with_context(|| format!("Invalid duration value: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration_to_millis("1500").unwrap(), 1500);
        assert_eq!(parse_duration_to_millis("500ms").unwrap(), 500);
        assert_eq!(parse_duration_to_millis("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_to_millis("2m").unwrap(), 120_000);
        assert_eq!(parse_duration_to_millis(" 1h ").unwrap(), 3_600_000);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration_to_millis("").is_err());
        assert!(parse_duration_to_millis("abc").is_err());
        assert!(parse_duration_to_millis("-5s").is_err());
        assert!(parse_duration_to_millis("10d").is_err());
    }
}
