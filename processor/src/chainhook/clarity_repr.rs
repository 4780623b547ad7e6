// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Recovers print payloads that only arrive as a Clarity `repr` string, e.g.
//! `(tuple (event "donated-stx") (campaignId u1) (amount u1000) (donor 'SP...))`.
//!
//! Every field is looked up independently with the same per-kind pattern, so fields may
//! appear in any order and unknown fields are ignored.

use crate::chainhook::canonical::sorted_object;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReprKind {
    /// `(key "text")` or `(key u"text")`
    Str,
    /// `(key u123)`
    Uint,
    /// `(key 'SP000...)` or `(key 'SP000....contract-name)`
    Principal,
}

const REPR_FIELDS: &[(&str, ReprKind)] = &[
    ("event", ReprKind::Str),
    ("token", ReprKind::Str),
    ("token", ReprKind::Principal),
    ("campaignId", ReprKind::Uint),
    ("campaign_id", ReprKind::Uint),
    ("campaign-id", ReprKind::Uint),
    ("amount", ReprKind::Uint),
    ("amountUstx", ReprKind::Uint),
    ("amountSats", ReprKind::Uint),
    ("ts", ReprKind::Uint),
    ("timestamp", ReprKind::Uint),
    ("donor", ReprKind::Principal),
    ("owner", ReprKind::Principal),
    ("beneficiary", ReprKind::Principal),
];

fn field_pattern(key: &str, kind: ReprKind) -> String {
    let value_pattern = match kind {
        ReprKind::Str => r#"u?"((?:[^"\\]|\\.)*)""#,
        ReprKind::Uint => r"u([0-9]+)",
        ReprKind::Principal => r"'([A-Za-z0-9][A-Za-z0-9.\-_]*)",
    };
    format!(r"\(\s*{}\s+{}\s*\)", regex::escape(key), value_pattern)
}

static REPR_PATTERNS: Lazy<Vec<(&'static str, ReprKind, Regex)>> = Lazy::new(|| {
    REPR_FIELDS
        .iter()
        .map(|(key, kind)| {
            let re = Regex::new(&field_pattern(key, *kind))
                .unwrap_or_else(|e| panic!("invalid repr pattern for {}: {}", key, e));
            (*key, *kind, re)
        })
        .collect()
});

/// Parses the known fields out of a Clarity `repr` string into a JSON object keyed like the
/// structured print value, so both decode paths share one field reader. Unsigned integers
/// are kept as digit strings to preserve precision.
///
/// Returns `None` when no known field is present.
pub fn parse_clarity_repr(repr: &str) -> Option<Value> {
    let mut fields: Vec<(String, Value)> = vec![];
    for (key, kind, re) in REPR_PATTERNS.iter() {
        if fields.iter().any(|(k, _)| k == key) {
            continue;
        }
        if let Some(captured) = re.captures(repr).and_then(|c| c.get(1)) {
            let value = match kind {
                // An unknown escape keeps the raw text rather than dropping the field.
                ReprKind::Str => unescape::unescape(captured.as_str())
                    .unwrap_or_else(|| captured.as_str().to_string()),
                ReprKind::Uint | ReprKind::Principal => captured.as_str().to_string(),
            };
            fields.push((key.to_string(), Value::String(value)));
        }
    }
    if fields.is_empty() {
        None
    } else {
        Some(sorted_object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_campaign_created() {
        let parsed =
            parse_clarity_repr(r#"(tuple (event "campaign-created") (campaignId u7) (owner 'SPabc))"#)
                .unwrap();
        assert_eq!(
            parsed,
            json!({"campaignId": "7", "event": "campaign-created", "owner": "SPabc"})
        );
    }

    #[test]
    fn test_fields_in_any_order_with_unknown_fields() {
        let parsed = parse_clarity_repr(
            "(tuple (goal u100000) (donor 'ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM) \
             (amount u1000) (memo (some 0x00)) (event \"donated-stx\") (campaign-id u3))",
        )
        .unwrap();
        assert_eq!(parsed["event"], "donated-stx");
        assert_eq!(parsed["amount"], "1000");
        assert_eq!(parsed["campaign-id"], "3");
        assert_eq!(parsed["donor"], "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
        assert!(parsed.get("goal").is_none());
    }

    #[test]
    fn test_contract_principal_and_utf8_string() {
        let parsed = parse_clarity_repr(
            r#"(tuple (event u"donated-sbtc") (token 'SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token) (amountSats u42) (ts u99))"#,
        )
        .unwrap();
        assert_eq!(parsed["event"], "donated-sbtc");
        assert_eq!(
            parsed["token"],
            "SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token"
        );
        assert_eq!(parsed["amountSats"], "42");
        assert_eq!(parsed["ts"], "99");
    }

    #[test]
    fn test_amount_key_does_not_match_longer_keys() {
        let parsed = parse_clarity_repr(r#"(tuple (event "refunded") (amountUstx u5))"#).unwrap();
        assert!(parsed.get("amount").is_none());
        assert_eq!(parsed["amountUstx"], "5");
    }

    #[test]
    fn test_escaped_quotes() {
        let parsed = parse_clarity_repr(r#"(tuple (event "say \"hi\""))"#).unwrap();
        assert_eq!(parsed["event"], "say \"hi\"");
    }

    #[test]
    fn test_escaped_control_characters() {
        let parsed =
            parse_clarity_repr(r#"(tuple (event "line\nnext\ttab \\ end") (campaignId u1))"#).unwrap();
        assert_eq!(parsed["event"], "line\nnext\ttab \\ end");
    }

    #[test]
    fn test_nothing_recognized() {
        assert_eq!(parse_clarity_repr("(ok true)"), None);
        assert_eq!(parse_clarity_repr(""), None);
    }
}
