// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::extra_unused_lifetimes)]

use crate::{
    chainhook::{compute_event_uid, extract_top_level_meta},
    schema::chainhook_deliveries,
};
use serde::{Deserialize, Serialize};

/// One accepted notification, stored verbatim so it can be replayed through a newer extractor.
#[derive(Clone, Debug, Deserialize, Insertable, PartialEq, Serialize)]
#[diesel(table_name = chainhook_deliveries)]
pub struct ChainhookDelivery {
    pub event_uid: String,
    pub hook_uuid: Option<String>,
    pub chain: Option<String>,
    pub network: Option<String>,
    pub action: Option<String>,
    pub block_height: Option<i64>,
    pub txid: Option<String>,
    pub contract_identifier: Option<String>,
    pub payload: serde_json::Value,
}

impl ChainhookDelivery {
    /// The delivery uid is the digest of the whole body, so a redelivered notification maps
    /// onto the same row.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let meta = extract_top_level_meta(payload);
        Self {
            event_uid: compute_event_uid(payload),
            hook_uuid: meta.hook_uuid,
            chain: meta.chain,
            network: meta.network,
            action: meta.action,
            block_height: meta.block_height,
            txid: meta.txid,
            contract_identifier: meta.contract_identifier,
            payload: payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload_reads_envelope() {
        let payload = json!({"uuid": "hook-1", "chain": "stacks", "apply": []});
        let delivery = ChainhookDelivery::from_payload(&payload);
        assert_eq!(delivery.hook_uuid.as_deref(), Some("hook-1"));
        assert_eq!(delivery.chain.as_deref(), Some("stacks"));
        assert_eq!(delivery.payload, payload);
        assert_eq!(delivery.event_uid.len(), 64);
    }

    #[test]
    fn test_uid_ignores_key_order() {
        let a = ChainhookDelivery::from_payload(&json!({"uuid": "x", "chain": "stacks"}));
        let b = ChainhookDelivery::from_payload(&json!({"chain": "stacks", "uuid": "x"}));
        assert_eq!(a.event_uid, b.event_uid);
    }
}
