// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::utils::util::{first_present, first_str, parse_i64};
use serde_json::Value;

/// Identifying fields read off the top level of a chainhook delivery. No recursion: these
/// describe the delivery, not the events inside it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopLevelMeta {
    pub hook_uuid: Option<String>,
    pub chain: Option<String>,
    pub network: Option<String>,
    pub action: Option<String>,
    pub block_height: Option<i64>,
    pub txid: Option<String>,
    pub contract_identifier: Option<String>,
}

/// Every field tolerates both the snake_case and camelCase spelling. Non-object payloads
/// yield an empty record.
pub fn extract_top_level_meta(payload: &Value) -> TopLevelMeta {
    if !payload.is_object() {
        return TopLevelMeta::default();
    }
    TopLevelMeta {
        hook_uuid: string_field(payload, &["uuid", "hook_uuid", "hookUuid"]),
        chain: string_field(payload, &["chain"]),
        network: string_field(payload, &["network"]),
        action: string_field(payload, &["action"]),
        block_height: first_present(payload, &["block_height", "blockHeight"]).and_then(parse_i64),
        txid: string_field(payload, &["txid"]),
        contract_identifier: string_field(payload, &["contract_identifier", "contractIdentifier"]),
    }
}

fn string_field(payload: &Value, keys: &[&str]) -> Option<String> {
    first_str(payload, keys).map(str::to_string)
}
