// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Turns one accepted chainhook delivery into stored rows: the raw delivery first, then every
//! fundraising event found in it, each insert independent and idempotent.

use crate::{
    chainhook::{extract_fundraising_events, ExtractOptions, ExtractedFundraisingEvent},
    db::postgres::models::fundraising_models::{
        chainhook_deliveries::ChainhookDelivery, fundraising_events::FundraisingEvent,
    },
    storage::ArcFundraisingStore,
    utils::counters::{
        DeliveryOutcome, CHAINHOOK_DELIVERIES_COUNT, FUNDRAISING_EVENTS_EXTRACTED_COUNT,
        FUNDRAISING_EVENTS_INSERTED_COUNT, INGESTION_LATENCY_IN_SECS, MISSING_CAMPAIGN_ID_COUNT,
    },
};
use anyhow::{bail, Result};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Default)]
pub struct IngestionConfig {
    /// Shared secret expected as `Authorization: Bearer <token>`. `None` disables the check.
    pub auth_token: Option<String>,
    pub expected_contract_identifier: Option<String>,
}

/// Acknowledgement body for an accepted delivery.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub ok: bool,
    pub deliveries_inserted: u32,
    pub extracted_events: usize,
    #[serde(skip)]
    pub delivery_uid: String,
    #[serde(skip)]
    pub delivery_was_new: bool,
    #[serde(skip)]
    pub inserted_events: usize,
}

#[derive(Clone, Debug)]
pub struct IngestionService {
    store: ArcFundraisingStore,
    config: IngestionConfig,
    extract_options: ExtractOptions,
}

impl IngestionService {
    pub fn new(store: ArcFundraisingStore, config: IngestionConfig) -> Self {
        let extract_options = ExtractOptions {
            expected_contract_identifier: config.expected_contract_identifier.clone(),
        };
        Self {
            store,
            config,
            extract_options,
        }
    }

    pub fn store(&self) -> &ArcFundraisingStore {
        &self.store
    }

    /// Checks the `Authorization` header value. A rejected request is counted and logged
    /// here; the caller must not persist anything for it.
    pub fn authorize(&self, authorization: Option<&str>) -> bool {
        let token = match self.config.auth_token.as_deref() {
            Some(token) => token,
            None => return true,
        };
        let authorized = authorization
            .and_then(|header| header.strip_prefix("Bearer "))
            .is_some_and(|presented| presented == token);
        if !authorized {
            warn!(
                has_authorization_header = authorization.is_some(),
                "[Chainhook] Rejected delivery with missing or invalid bearer token"
            );
            CHAINHOOK_DELIVERIES_COUNT
                .with_label_values(&[DeliveryOutcome::Unauthorized.get_label()])
                .inc();
        }
        authorized
    }

    pub async fn ingest(&self, payload: &Value) -> Result<IngestionSummary> {
        let start_time = std::time::Instant::now();
        match self.ingest_inner(payload).await {
            Ok(summary) => {
                let outcome = if summary.delivery_was_new {
                    DeliveryOutcome::Inserted
                } else {
                    DeliveryOutcome::Duplicate
                };
                CHAINHOOK_DELIVERIES_COUNT
                    .with_label_values(&[outcome.get_label()])
                    .inc();
                let duration_in_secs = start_time.elapsed().as_secs_f64();
                INGESTION_LATENCY_IN_SECS.set(duration_in_secs);
                info!(
                    delivery_uid = summary.delivery_uid.as_str(),
                    delivery_was_new = summary.delivery_was_new,
                    extracted_events = summary.extracted_events,
                    inserted_events = summary.inserted_events,
                    duration_in_secs,
                    "[Chainhook] Delivery processed",
                );
                Ok(summary)
            },
            Err(e) => {
                CHAINHOOK_DELIVERIES_COUNT
                    .with_label_values(&[DeliveryOutcome::Error.get_label()])
                    .inc();
                error!(error = ?e, "[Chainhook] Failed to persist delivery");
                Err(e)
            },
        }
    }

    async fn ingest_inner(&self, payload: &Value) -> Result<IngestionSummary> {
        let delivery = ChainhookDelivery::from_payload(payload);
        let delivery_uid = delivery.event_uid.clone();
        info!(
            delivery_uid = delivery_uid.as_str(),
            hook_uuid = delivery.hook_uuid.as_deref().unwrap_or_default(),
            "[Chainhook] Received delivery",
        );
        let delivery_was_new = self.store.insert_delivery(delivery).await?;

        let events: Vec<ExtractedFundraisingEvent> =
            extract_fundraising_events(payload, &self.extract_options)
                .into_iter()
                .filter(|event| has_campaign_id(event, &delivery_uid))
                .collect();
        let extracted_events = events.len();

        let results = join_all(events.into_iter().map(|event| async move {
            FUNDRAISING_EVENTS_EXTRACTED_COUNT
                .with_label_values(&[event.event_name.as_str()])
                .inc();
            let event_uid = event.event_uid.clone();
            let result = self.store.insert_event(FundraisingEvent::from(event)).await;
            let label = match &result {
                Ok(true) => "inserted",
                Ok(false) => "duplicate",
                Err(e) => {
                    error!(event_uid = event_uid.as_str(), error = ?e, "[Chainhook] Failed to insert event");
                    "error"
                },
            };
            FUNDRAISING_EVENTS_INSERTED_COUNT
                .with_label_values(&[label])
                .inc();
            result
        }))
        .await;

        let mut inserted_events = 0;
        let mut failed_events = 0;
        for result in results {
            match result {
                Ok(true) => inserted_events += 1,
                Ok(false) => {},
                Err(_) => failed_events += 1,
            }
        }
        if failed_events > 0 {
            bail!(
                "{} of {} fundraising events failed to insert for delivery {}",
                failed_events,
                extracted_events,
                delivery_uid
            );
        }

        Ok(IngestionSummary {
            ok: true,
            deliveries_inserted: 1,
            extracted_events,
            delivery_uid,
            delivery_was_new,
            inserted_events,
        })
    }
}

fn has_campaign_id(event: &ExtractedFundraisingEvent, delivery_uid: &str) -> bool {
    if event.campaign_id.is_some() {
        return true;
    }
    warn!(
        delivery_uid,
        event_uid = event.event_uid.as_str(),
        event_name = event.event_name.as_str(),
        "[Chainhook] Dropping fundraising event without a campaign id",
    );
    MISSING_CAMPAIGN_ID_COUNT.inc();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FundraisingStore, InMemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn delivery(campaign_id: Value, amount: u64) -> Value {
        json!({
            "uuid": "hook-1",
            "chain": "stacks",
            "apply": [{
                "block_identifier": {"index": 10},
                "transactions": [{
                    "transaction_identifier": {"hash": "0xabc"},
                    "metadata": {"receipt": {"events": [{
                        "type": "SmartContractEvent",
                        "data": {
                            "contract_identifier": "SP1.fundraising",
                            "value": {"event": "donated-stx", "campaignId": campaign_id, "amount": amount, "donor": "SPD"}
                        }
                    }]}}
                }]
            }]
        })
    }

    fn service(store: Arc<InMemoryStore>, auth_token: Option<&str>) -> IngestionService {
        IngestionService::new(store, IngestionConfig {
            auth_token: auth_token.map(str::to_string),
            expected_contract_identifier: None,
        })
    }

    #[test]
    fn test_authorize() {
        let store = Arc::new(InMemoryStore::new());
        let open = service(store.clone(), None);
        assert!(open.authorize(None));
        assert!(open.authorize(Some("Bearer anything")));

        let guarded = service(store, Some("secret"));
        assert!(guarded.authorize(Some("Bearer secret")));
        assert!(!guarded.authorize(Some("Bearer wrong")));
        assert!(!guarded.authorize(Some("secret")));
        assert!(!guarded.authorize(Some("bearer secret")));
        assert!(!guarded.authorize(None));
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store.clone(), None);
        let payload = delivery(json!(9), 1000);

        let first = svc.ingest(&payload).await.unwrap();
        assert!(first.delivery_was_new);
        assert_eq!(first.extracted_events, 1);
        assert_eq!(first.inserted_events, 1);

        let second = svc.ingest(&payload).await.unwrap();
        assert!(!second.delivery_was_new);
        assert_eq!(second.extracted_events, 1);
        assert_eq!(second.inserted_events, 0);
        assert_eq!(second.delivery_uid, first.delivery_uid);

        assert_eq!(store.delivery_count(), 1);
        assert_eq!(store.event_count(), 1);
        let summary = store.campaign_summary(9).await.unwrap().unwrap();
        assert_eq!(summary.total_stx, "1000");
    }

    #[tokio::test]
    async fn test_events_without_campaign_id_are_dropped() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store.clone(), None);
        let summary = svc.ingest(&delivery(Value::Null, 5)).await.unwrap();
        assert_eq!(summary.extracted_events, 0);
        assert_eq!(store.delivery_count(), 1);
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_events_is_success() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store.clone(), None);
        let summary = svc.ingest(&json!({"apply": []})).await.unwrap();
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"ok": true, "deliveriesInserted": 1, "extractedEvents": 0})
        );
        assert_eq!(store.delivery_count(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        store.set_unavailable(true);
        let svc = service(store, None);
        assert!(svc.ingest(&delivery(json!(1), 5)).await.is_err());
    }
}
