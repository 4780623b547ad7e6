// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, Gauge, IntCounter,
    IntCounterVec,
};

pub enum DeliveryOutcome {
    Inserted,
    Duplicate,
    Unauthorized,
    Error,
}

impl DeliveryOutcome {
    pub fn get_label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Inserted => "inserted",
            DeliveryOutcome::Duplicate => "duplicate",
            DeliveryOutcome::Unauthorized => "unauthorized",
            DeliveryOutcome::Error => "error",
        }
    }
}

/// Number of chainhook deliveries received, by outcome
pub static CHAINHOOK_DELIVERIES_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fundraising_chainhook_deliveries_count",
        "Number of chainhook deliveries received, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Number of fundraising events extracted from deliveries
pub static FUNDRAISING_EVENTS_EXTRACTED_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fundraising_events_extracted_count",
        "Number of fundraising events extracted from deliveries",
        &["event_name"]
    )
    .unwrap()
});

/// Number of fundraising event inserts, by outcome (inserted, duplicate, error)
pub static FUNDRAISING_EVENTS_INSERTED_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fundraising_events_inserted_count",
        "Number of fundraising event inserts, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Print events whose name resembles a fundraising event but was not accepted
pub static NEAR_MISS_EVENT_NAME_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fundraising_near_miss_event_names_count",
        "Print events whose name resembles a fundraising event but was not accepted"
    )
    .unwrap()
});

/// Fundraising events dropped because no campaign id could be resolved
pub static MISSING_CAMPAIGN_ID_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fundraising_events_missing_campaign_id_count",
        "Fundraising events dropped because no campaign id could be resolved"
    )
    .unwrap()
});

/// Time spent handling the last accepted delivery
pub static INGESTION_LATENCY_IN_SECS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "fundraising_ingestion_latency_in_secs",
        "Time spent handling the last accepted delivery"
    )
    .unwrap()
});

/// Number of read API requests, by endpoint and status code
pub static API_REQUEST_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fundraising_api_request_count",
        "Number of read API requests, by endpoint and status code",
        &["endpoint", "status"]
    )
    .unwrap()
});

/// Number of times the connection pool has timed out when trying to get a connection
pub static UNABLE_TO_GET_CONNECTION_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fundraising_connection_pool_err",
        "Number of times the connection pool has timed out when trying to get a connection"
    )
    .unwrap()
});

/// Number of times the connection pool got a connection
pub static GOT_CONNECTION_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fundraising_connection_pool_ok",
        "Number of times the connection pool got a connection"
    )
    .unwrap()
});
