// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Best-effort extraction of fundraising print events from chainhook payloads.
//!
//! Payload shapes vary between chainhook and node versions, so the walk makes no assumption
//! about where print events live. Every object is inspected, context (txid, block height,
//! contract) is inherited down the tree, and each recognized print node goes through an
//! ordered chain of decoding strategies. Nothing in here fails: a strategy that does not
//! match simply defers to the next one.

use crate::{
    chainhook::{canonical::compute_event_uid, clarity_repr::parse_clarity_repr},
    utils::{
        counters::NEAR_MISS_EVENT_NAME_COUNT,
        util::{first_present, first_str, get_str, parse_digits, parse_i64, parse_unsigned_integer},
    },
};
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

/// Type tags that mark a contract log / print node. Only ever extend this list: older
/// payload versions keep arriving long after a new format ships.
pub const PRINT_EVENT_TYPES: &[&str] = &[
    "smart_contract_log",
    "contract_log",
    "print",
    "print_event",
    "SmartContractEvent",
];
const TYPE_TAG_KEYS: &[&str] = &["type", "event_type"];

/// Field names holding an already decoded print value, in order of preference.
const VALUE_KEYS: &[&str] = &["value", "decoded_clarity_value", "decoded_value"];
/// Objects some formats nest the print body under.
const PRINT_BODY_KEYS: &[&str] = &["data", "contract_log"];

const TXID_KEYS: &[&str] = &["txid", "tx_id"];
const BLOCK_HEIGHT_KEYS: &[&str] = &["block_height", "blockHeight"];
const CONTRACT_IDENTIFIER_KEYS: &[&str] =
    &["contract_identifier", "contractIdentifier", "contract_id"];

const CAMPAIGN_ID_KEYS: &[&str] = &["campaignId", "campaign_id", "campaign-id"];
const AMOUNT_KEYS: &[&str] = &["amount", "amountUstx", "amountSats"];
const TS_KEYS: &[&str] = &["ts", "timestamp"];

const FUNDRAISING_EVENT_MARKERS: &[&str] = &["campaign-", "donated-", "refunded"];
const NEAR_MISS_MARKERS: &[&str] = &["campaign", "donat", "refund"];

#[derive(Clone, Debug, Default)]
pub struct ExtractOptions {
    /// When set, print events emitted by any other contract are skipped.
    pub expected_contract_identifier: Option<String>,
}

/// Context inherited from ancestors of a node. A deeper value overrides an inherited one.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EventContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(rename = "blockHeight", skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i64>,
    #[serde(rename = "contractIdentifier", skip_serializing_if = "Option::is_none")]
    pub contract_identifier: Option<String>,
}

impl EventContext {
    /// Context for `node`: its own fields where present, otherwise the inherited ones.
    pub fn inherit(&self, node: &Value) -> Self {
        let txid = first_str(node, TXID_KEYS)
            .or_else(|| {
                node.get("transaction_identifier")
                    .and_then(|t| get_str(t, "hash"))
            })
            .map(str::to_string);
        let block_height = first_present(node, BLOCK_HEIGHT_KEYS)
            .and_then(parse_i64)
            .or_else(|| {
                node.get("block_identifier")
                    .and_then(|b| b.get("index"))
                    .and_then(parse_i64)
            });
        let contract_identifier = first_str(node, CONTRACT_IDENTIFIER_KEYS).map(str::to_string);

        Self {
            txid: txid.or_else(|| self.txid.clone()),
            block_height: block_height.or(self.block_height),
            contract_identifier: contract_identifier.or_else(|| self.contract_identifier.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtractedFundraisingEvent {
    pub event_uid: String,
    pub event_name: String,
    pub campaign_id: Option<i64>,
    pub donor: Option<String>,
    pub owner: Option<String>,
    pub beneficiary: Option<String>,
    pub token: Option<String>,
    pub amount: Option<BigDecimal>,
    pub ts: Option<BigDecimal>,
    pub txid: Option<String>,
    pub block_height: Option<i64>,
    pub contract_identifier: Option<String>,
    /// `{ctx, node}`: the matched node with the context it was found in.
    pub raw: Value,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventNameClass {
    Fundraising,
    /// Looks related to fundraising but fails the filter. Skipped, but worth a warning.
    NearMiss,
    Unrelated,
}

pub fn classify_event_name(name: &str) -> EventNameClass {
    if FUNDRAISING_EVENT_MARKERS.iter().any(|m| name.contains(m)) {
        return EventNameClass::Fundraising;
    }
    let lowered = name.to_lowercase();
    if NEAR_MISS_MARKERS.iter().any(|m| lowered.contains(m)) {
        EventNameClass::NearMiss
    } else {
        EventNameClass::Unrelated
    }
}

/// Walks `payload` depth first and returns every fundraising print event found in it, in
/// document order.
pub fn extract_fundraising_events(
    payload: &Value,
    options: &ExtractOptions,
) -> Vec<ExtractedFundraisingEvent> {
    let mut results = vec![];
    visit(payload, &EventContext::default(), options, &mut results);
    results
}

fn visit(
    node: &Value,
    context: &EventContext,
    options: &ExtractOptions,
    results: &mut Vec<ExtractedFundraisingEvent>,
) {
    match node {
        Value::Array(items) => {
            for item in items {
                visit(item, context, options, results);
            }
        },
        Value::Object(map) => {
            let next_context = context.inherit(node);
            if is_print_node(node) {
                if let Some(event) = decode_print_node(node, &next_context, options) {
                    results.push(event);
                }
            }
            // Print events can sit at any depth, including under a matched node.
            for value in map.values() {
                visit(value, &next_context, options, results);
            }
        },
        _ => {},
    }
}

fn is_print_node(node: &Value) -> bool {
    first_str(node, TYPE_TAG_KEYS).is_some_and(|tag| PRINT_EVENT_TYPES.contains(&tag))
}

/// Containers a print body may live in: the node itself, then the nested body objects.
fn print_bodies(node: &Value) -> impl Iterator<Item = &Value> {
    std::iter::once(node).chain(PRINT_BODY_KEYS.iter().filter_map(move |k| node.get(*k)))
}

fn node_contract_identifier(node: &Value) -> Option<&str> {
    print_bodies(node).find_map(|body| first_str(body, CONTRACT_IDENTIFIER_KEYS))
}

/// An already decoded object under one of the value keys.
fn structured_value(node: &Value) -> Option<Value> {
    print_bodies(node).find_map(|body| {
        VALUE_KEYS.iter().find_map(|key| {
            let v = body.get(*key)?;
            v.as_object()
                .filter(|map| !is_repr_wrapper(map))
                .map(|_| v.clone())
        })
    })
}

/// A Clarity `repr` string under one of the value keys, either bare or as `{repr: ...}`.
fn repr_value(node: &Value) -> Option<Value> {
    print_bodies(node).find_map(|body| {
        VALUE_KEYS.iter().find_map(|key| {
            let repr = match body.get(*key)? {
                Value::String(s) => s.as_str(),
                Value::Object(map) => map.get("repr")?.as_str()?,
                _ => return None,
            };
            parse_clarity_repr(repr)
        })
    })
}

fn is_repr_wrapper(map: &serde_json::Map<String, Value>) -> bool {
    map.get("repr").is_some_and(Value::is_string) && !map.contains_key("event")
}

fn resolve_print_value(node: &Value) -> Value {
    structured_value(node)
        .or_else(|| repr_value(node))
        .unwrap_or_else(|| node.clone())
}

fn decode_print_node(
    node: &Value,
    context: &EventContext,
    options: &ExtractOptions,
) -> Option<ExtractedFundraisingEvent> {
    let contract_identifier = node_contract_identifier(node)
        .map(str::to_string)
        .or_else(|| context.contract_identifier.clone());
    if let (Some(expected), Some(actual)) = (
        options.expected_contract_identifier.as_deref(),
        contract_identifier.as_deref(),
    ) {
        if expected != actual {
            return None;
        }
    }

    let value = resolve_print_value(node);
    let event_name = get_str(&value, "event")?.to_string();
    match classify_event_name(&event_name) {
        EventNameClass::Fundraising => {},
        EventNameClass::NearMiss => {
            warn!(
                event_name = event_name.as_str(),
                contract_identifier = contract_identifier.as_deref().unwrap_or_default(),
                txid = context.txid.as_deref().unwrap_or_default(),
                "[Chainhook] Print event name looks like a fundraising event but is not recognized",
            );
            NEAR_MISS_EVENT_NAME_COUNT.inc();
            return None;
        },
        EventNameClass::Unrelated => return None,
    }

    let raw = json!({
        "ctx": context,
        "node": node,
    });
    let event_uid = compute_event_uid(&raw);

    Some(ExtractedFundraisingEvent {
        event_uid,
        event_name,
        campaign_id: first_present(&value, CAMPAIGN_ID_KEYS)
            .and_then(parse_clarity_uint)
            .and_then(|v| v.to_i64()),
        donor: principal_field(&value, "donor"),
        owner: principal_field(&value, "owner"),
        beneficiary: principal_field(&value, "beneficiary"),
        token: principal_field(&value, "token"),
        amount: first_present(&value, AMOUNT_KEYS).and_then(parse_clarity_uint),
        ts: first_present(&value, TS_KEYS).and_then(parse_clarity_uint),
        txid: context.txid.clone(),
        block_height: context.block_height,
        contract_identifier,
        raw,
    })
}

/// Plain numbers and digit strings, plus the `u123` form some decoders leave in place.
fn parse_clarity_uint(value: &Value) -> Option<BigDecimal> {
    parse_unsigned_integer(value).or_else(|| {
        value
            .as_str()
            .and_then(|s| s.strip_prefix('u'))
            .and_then(parse_digits)
    })
}

/// String field with the Clarity principal quote (`'SP...`) removed if present.
fn principal_field(value: &Value, key: &str) -> Option<String> {
    get_str(value, key).map(|s| s.strip_prefix('\'').unwrap_or(s).to_string())
}
