// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Normalizes a number-like JSON value into an unsigned integer.
///
/// Accepts JSON numbers (fractional parts are truncated) and strings made only of ascii
/// digits. Anything else, including negative numbers, is treated as absent.
pub fn parse_unsigned_integer(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(BigDecimal::from(u))
            } else if n.as_i64().is_some() {
                // Only negative integers land here.
                None
            } else {
                let f = n.as_f64()?;
                if !f.is_finite() || f < 0.0 {
                    return None;
                }
                // Large or fractional floats: keep the integral digits only.
                BigDecimal::from_str(&format!("{:.0}", f.trunc())).ok()
            }
        },
        Value::String(s) => parse_digits(s),
        _ => None,
    }
}

/// Parses a string consisting only of ascii digits.
pub fn parse_digits(s: &str) -> Option<BigDecimal> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigDecimal::from_str(s).ok()
}

/// Same as [`parse_unsigned_integer`] but narrowed to an `i64` (the size of a BIGINT column).
pub fn parse_i64(value: &Value) -> Option<i64> {
    parse_unsigned_integer(value).and_then(|v| v.to_i64())
}

/// Returns the string at `key` if `value` is an object and the field is a string.
pub fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// First string field found among `keys`, in order.
pub fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| get_str(value, key))
}

/// First non-null field found among `keys`, in order.
pub fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| value.get(key).filter(|v| !v.is_null()))
}

/// Postgres rejects `\u0000` in text and jsonb columns. Round-trips the item through
/// serde_json, stripping null bytes from every string on the way.
pub fn remove_null_bytes<T: Serialize + DeserializeOwned + Clone>(input: &T) -> T {
    let mut txn_json = match serde_json::to_value(input) {
        Ok(json) => json,
        Err(_) => return input.clone(),
    };
    strip_null_bytes(&mut txn_json);
    serde_json::from_value::<T>(txn_json).unwrap_or_else(|_| input.clone())
}

fn strip_null_bytes(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('\u{0000}') {
                *s = s.replace('\u{0000}', "");
            }
        },
        Value::Array(items) => items.iter_mut().for_each(strip_null_bytes),
        Value::Object(map) => {
            let keys_with_nulls: Vec<String> = map
                .keys()
                .filter(|k| k.contains('\u{0000}'))
                .cloned()
                .collect();
            for key in keys_with_nulls {
                if let Some(v) = map.remove(&key) {
                    map.insert(key.replace('\u{0000}', ""), v);
                }
            }
            map.values_mut().for_each(strip_null_bytes);
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_parse_unsigned_integer() {
        assert_eq!(
            parse_unsigned_integer(&json!(5000)),
            Some(BigDecimal::from(5000))
        );
        assert_eq!(
            parse_unsigned_integer(&json!("340282366920938463463374607431768211455")),
            Some(BigDecimal::from_str("340282366920938463463374607431768211455").unwrap())
        );
        assert_eq!(
            parse_unsigned_integer(&json!(12.9)),
            Some(BigDecimal::from(12))
        );
        assert_eq!(parse_unsigned_integer(&json!(-3)), None);
        assert_eq!(parse_unsigned_integer(&json!("12a")), None);
        assert_eq!(parse_unsigned_integer(&json!("")), None);
        assert_eq!(parse_unsigned_integer(&json!(" 12")), None);
        assert_eq!(parse_unsigned_integer(&json!(true)), None);
        assert_eq!(parse_unsigned_integer(&json!(null)), None);
    }

    #[test]
    fn test_parse_i64_out_of_range_is_absent() {
        assert_eq!(parse_i64(&json!("9")), Some(9));
        assert_eq!(parse_i64(&json!("99999999999999999999999")), None);
    }

    #[test]
    fn test_first_present_skips_nulls() {
        let v = json!({"amount": null, "amountUstx": "10", "amountSats": "20"});
        assert_eq!(
            first_present(&v, &["amount", "amountUstx", "amountSats"]),
            Some(&json!("10"))
        );
        assert_eq!(first_str(&v, &["amountUstx"]), Some("10"));
        assert_eq!(first_str(&json!([1, 2]), &["a"]), None);
    }

    #[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
    struct Row {
        name: String,
        raw: Value,
    }

    #[test]
    fn test_remove_null_bytes() {
        let row = Row {
            name: "don\u{0000}or".to_string(),
            raw: json!({"k\u{0000}": ["a\u{0000}b", 1]}),
        };
        let cleaned = remove_null_bytes(&row);
        assert_eq!(cleaned.name, "donor");
        assert_eq!(cleaned.raw, json!({"k": ["ab", 1]}));
    }
}
