// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::extra_unused_lifetimes)]

use crate::{chainhook::ExtractedFundraisingEvent, schema::fundraising_events};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

pub const DONATED_STX: &str = "donated-stx";
pub const DONATED_SBTC: &str = "donated-sbtc";
pub const DONATED_PREFIX: &str = "donated-";
pub const CAMPAIGN_CREATED: &str = "campaign-created";
pub const CAMPAIGN_CANCELLED: &str = "campaign-cancelled";
pub const CAMPAIGN_WITHDRAWN: &str = "campaign-withdrawn";

#[derive(Clone, Debug, Deserialize, Insertable, PartialEq, Serialize)]
#[diesel(table_name = fundraising_events)]
pub struct FundraisingEvent {
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
    pub raw: serde_json::Value,
}

impl From<ExtractedFundraisingEvent> for FundraisingEvent {
    fn from(event: ExtractedFundraisingEvent) -> Self {
        Self {
            event_uid: event.event_uid,
            event_name: event.event_name,
            campaign_id: event.campaign_id,
            donor: event.donor,
            owner: event.owner,
            beneficiary: event.beneficiary,
            token: event.token,
            amount: event.amount,
            ts: event.ts,
            txid: event.txid,
            block_height: event.block_height,
            contract_identifier: event.contract_identifier,
            raw: event.raw,
        }
    }
}

/// A stored row with its surrogate id and insertion time, as kept by the in-memory store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FundraisingEventQuery {
    pub id: i64,
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
    pub raw: serde_json::Value,
    pub inserted_at: chrono::NaiveDateTime,
}

impl FundraisingEventQuery {
    pub fn from_insert(id: i64, event: FundraisingEvent, inserted_at: chrono::NaiveDateTime) -> Self {
        Self {
            id,
            event_uid: event.event_uid,
            event_name: event.event_name,
            campaign_id: event.campaign_id,
            donor: event.donor,
            owner: event.owner,
            beneficiary: event.beneficiary,
            token: event.token,
            amount: event.amount,
            ts: event.ts,
            txid: event.txid,
            block_height: event.block_height,
            contract_identifier: event.contract_identifier,
            raw: event.raw,
            inserted_at,
        }
    }

    pub fn is_donation(&self) -> bool {
        self.event_name.starts_with(DONATED_PREFIX)
    }
}
