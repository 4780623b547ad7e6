// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Read-side rows. Amount sums are rendered as decimal text so arbitrary precision survives
//! the trip to JSON.

#![allow(clippy::extra_unused_lifetimes)]

use diesel::sql_types::{BigInt, Bool, Integer, Nullable, Text, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, QueryableByName, Serialize)]
pub struct CampaignSummary {
    #[diesel(sql_type = BigInt)]
    pub campaign_id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub owner: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub beneficiary: Option<String>,
    #[diesel(sql_type = Integer)]
    pub donation_count: i32,
    #[diesel(sql_type = Text)]
    pub total_stx: String,
    #[diesel(sql_type = Text)]
    pub total_sbtc: String,
    #[diesel(sql_type = Bool)]
    pub is_cancelled: bool,
    #[diesel(sql_type = Bool)]
    pub is_withdrawn: bool,
    #[diesel(sql_type = Timestamp)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, QueryableByName, Serialize)]
pub struct LeaderboardEntry {
    #[diesel(sql_type = Text)]
    pub donor: String,
    #[diesel(sql_type = Text)]
    pub total_stx: String,
    #[diesel(sql_type = Text)]
    pub total_sbtc: String,
    #[diesel(sql_type = Integer)]
    pub donation_count: i32,
}

/// One row of a campaign's event list or of the global activity feed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, QueryableByName, Serialize)]
pub struct EventRecord {
    #[diesel(sql_type = Text)]
    pub event_name: String,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub campaign_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub donor: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub owner: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub beneficiary: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub amount: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub token: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub txid: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub block_height: Option<i64>,
    #[diesel(sql_type = Timestamp)]
    pub inserted_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, QueryableByName, Serialize)]
pub struct DonorDonation {
    #[diesel(sql_type = Nullable<BigInt>)]
    pub campaign_id: Option<i64>,
    #[diesel(sql_type = Text)]
    pub event_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub amount: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub txid: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub block_height: Option<i64>,
    #[diesel(sql_type = Timestamp)]
    pub inserted_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, QueryableByName, Serialize)]
pub struct PlatformStats {
    #[diesel(sql_type = Integer)]
    pub total_campaigns: i32,
    #[diesel(sql_type = Integer)]
    pub campaigns_funded: i32,
    #[diesel(sql_type = Text)]
    pub total_stx_raised: String,
    #[diesel(sql_type = Text)]
    pub total_sbtc_raised: String,
    #[diesel(sql_type = Integer)]
    pub unique_donors: i32,
    #[diesel(sql_type = Integer)]
    pub total_donations: i32,
}
