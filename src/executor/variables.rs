//! Variables handling for persisted query requests
//!
//! Variables arrive as a JSON string produced by a language model, which
//! tends to quote numbers. Numeric-looking strings are turned back into
//! numbers before the request is sent.

use crate::error::{Error, Result};
use serde_json::{Number, Value};

/// Parse a variables string. `None` and empty input mean "no variables".
pub fn parse_variables(raw: Option<&str>) -> Result<Option<Value>> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(None),
    };

    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::InvalidVariables(e.to_string()))?;
    Ok(Some(coerce_numeric_strings(value)))
}

/// Decimal digits an `f64` always reproduces exactly
const F64_EXACT_DIGITS: usize = 15;

/// Number a string denotes, if its trimmed text is a finite number that
/// survives the conversion unchanged
fn numeric_value(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = trimmed.parse::<u64>() {
        return Some(Number::from(uint));
    }
    // Integer syntax that fits neither type would lose digits as a float
    if trimmed
        .strip_prefix(|c: char| c == '+' || c == '-')
        .unwrap_or(trimmed)
        .bytes()
        .all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let parsed: f64 = trimmed.parse().ok()?;
    if !parsed.is_finite() || significant_digits(trimmed) > F64_EXACT_DIGITS {
        return None;
    }

    if parsed.fract() == 0.0 && parsed >= i64::MIN as f64 && parsed < i64::MAX as f64 {
        return Some(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
}

/// Significant digits of the mantissa of a decimal literal
fn significant_digits(literal: &str) -> usize {
    let mantissa = literal
        .split(|c| c == 'e' || c == 'E')
        .next()
        .unwrap_or(literal);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').trim_end_matches('0').len()
}

/// Replace every numeric-looking string in `value` with a number.
/// Object keys are left alone.
pub fn coerce_numeric_strings(value: Value) -> Value {
    match value {
        Value::String(text) => match numeric_value(&text) {
            Some(number) => Value::Number(number),
            None => Value::String(text),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_numeric_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, coerce_numeric_strings(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_become_numbers() {
        let value = parse_variables(Some(r#"{"limit":"5"}"#)).unwrap().unwrap();
        assert_eq!(value, json!({"limit": 5}));
        assert!(value["limit"].is_i64());

        let value = parse_variables(Some(r#"{"ratio":"2.5","offset":" 10 ","exp":"1e3"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({"ratio": 2.5, "offset": 10, "exp": 1000}));
    }

    #[test]
    fn test_nested_values_and_keys() {
        let value = parse_variables(Some(
            r#"{"filter":{"seats":["1","2A"],"42":"flight"},"id":"7"}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            value,
            json!({"filter": {"seats": [1, "2A"], "42": "flight"}, "id": 7})
        );
    }

    #[test]
    fn test_non_numeric_strings_kept() {
        let value = parse_variables(Some(r#"{"a":"","b":"  ","c":"NaN","d":"inf","e":"LAX"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({"a": "", "b": "  ", "c": "NaN", "d": "inf", "e": "LAX"}));
    }

    #[test]
    fn test_top_level_string_and_scalars() {
        assert_eq!(parse_variables(Some("\"12\"")).unwrap(), Some(json!(12)));
        assert_eq!(
            parse_variables(Some(r#"{"flag":true,"n":null,"x":3}"#)).unwrap(),
            Some(json!({"flag": true, "n": null, "x": 3}))
        );
    }

    #[test]
    fn test_large_integers_keep_their_digits() {
        let value = parse_variables(Some(
            r#"{"id":"12345678901234567890","n":"9007199254740993","min":"-9223372036854775808"}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(value["id"].as_u64(), Some(12345678901234567890));
        assert_eq!(value["n"].as_i64(), Some(9007199254740993));
        assert_eq!(value["min"].as_i64(), Some(i64::MIN));

        let value = parse_variables(Some(
            r#"{"huge":"123456789012345678901234567890","precise":"0.12345678901234567891"}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            value,
            json!({"huge": "123456789012345678901234567890", "precise": "0.12345678901234567891"})
        );
    }

    #[test]
    fn test_absent_variables() {
        assert_eq!(parse_variables(None).unwrap(), None);
        assert_eq!(parse_variables(Some("")).unwrap(), None);
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_variables(Some("not json")).unwrap_err();
        assert!(matches!(err, Error::InvalidVariables(_)));
        assert!(err.to_string().starts_with("Invalid JSON string for variables"));
    }
}
