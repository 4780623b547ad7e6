// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Deterministic serialization and content addressing of JSON-like values.
//!
//! Object keys are sorted by code point, array order is kept as is, and a container that is
//! re-entered while it is still being walked is replaced by [`CIRCULAR_SENTINEL`].

use ahash::AHashSet;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const CIRCULAR_SENTINEL: &str = "[Circular]";

/// Something that can be lowered into a canonical [`Value`].
///
/// `seen` holds the identities of the containers on the current path of the walk.
/// Implementations must check it before descending into a container and release the
/// identity once the container has been fully visited.
pub trait Canonicalize {
    fn to_canonical_value(&self, seen: &mut AHashSet<usize>) -> Value;
}

impl Canonicalize for Value {
    fn to_canonical_value(&self, seen: &mut AHashSet<usize>) -> Value {
        match self {
            Value::Array(items) => {
                let id = self as *const Value as usize;
                if !seen.insert(id) {
                    return Value::String(CIRCULAR_SENTINEL.to_string());
                }
                let out = Value::Array(items.iter().map(|v| v.to_canonical_value(seen)).collect());
                seen.remove(&id);
                out
            },
            Value::Object(map) => {
                let id = self as *const Value as usize;
                if !seen.insert(id) {
                    return Value::String(CIRCULAR_SENTINEL.to_string());
                }
                let entries = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical_value(seen)))
                    .collect();
                seen.remove(&id);
                sorted_object(entries)
            },
            scalar => scalar.clone(),
        }
    }
}

/// Builds an object whose keys are inserted in code point order. With `preserve_order`
/// enabled serde_json serializes in insertion order, so the order has to be fixed here.
pub fn sorted_object(mut entries: Vec<(String, Value)>) -> Value {
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    let mut map = Map::with_capacity(entries.len());
    for (k, v) in entries {
        map.insert(k, v);
    }
    Value::Object(map)
}

/// Stable string form of `value`.
pub fn canonical_json_string<T: Canonicalize + ?Sized>(value: &T) -> String {
    let mut seen = AHashSet::new();
    let canonical = value.to_canonical_value(&mut seen);
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// Hex encoded sha256 of the canonical form. Used as the dedup key for both deliveries and
/// extracted events.
pub fn compute_event_uid<T: Canonicalize + ?Sized>(value: &T) -> String {
    let digest = Sha256::digest(canonical_json_string(value).as_bytes());
    hex::encode(digest)
}
