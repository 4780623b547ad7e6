// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{aggregations, FundraisingStore};
use crate::db::postgres::models::fundraising_models::{
    chainhook_deliveries::ChainhookDelivery,
    fundraising_events::{FundraisingEvent, FundraisingEventQuery},
    fundraising_views::{CampaignSummary, DonorDonation, EventRecord, LeaderboardEntry, PlatformStats},
};
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock, RwLockReadGuard, RwLockWriteGuard,
};

#[derive(Debug, Default)]
struct State {
    deliveries: AHashMap<String, ChainhookDelivery>,
    event_uids: AHashSet<String>,
    events: Vec<FundraisingEventQuery>,
}

/// Process-local store with the same conflict and aggregation semantics as Postgres. Used
/// for local runs without a database and by tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

fn limit_to_usize(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or_default()
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn delivery_count(&self) -> usize {
        self.read().map(|s| s.deliveries.len()).unwrap_or_default()
    }

    pub fn event_count(&self) -> usize {
        self.read().map(|s| s.events.len()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("in-memory store marked unavailable");
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait::async_trait]
impl FundraisingStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn health_check(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    async fn insert_delivery(&self, delivery: ChainhookDelivery) -> Result<bool> {
        let mut state = self.write()?;
        if state.deliveries.contains_key(&delivery.event_uid) {
            return Ok(false);
        }
        state.deliveries.insert(delivery.event_uid.clone(), delivery);
        Ok(true)
    }

    async fn insert_event(&self, event: FundraisingEvent) -> Result<bool> {
        let mut state = self.write()?;
        if !state.event_uids.insert(event.event_uid.clone()) {
            return Ok(false);
        }
        let id = state.events.len() as i64 + 1;
        let row = FundraisingEventQuery::from_insert(id, event, chrono::Utc::now().naive_utc());
        state.events.push(row);
        Ok(true)
    }

    async fn campaign_summaries(&self) -> Result<Vec<CampaignSummary>> {
        Ok(aggregations::campaign_summaries(&self.read()?.events))
    }

    async fn campaign_summary(&self, campaign_id: i64) -> Result<Option<CampaignSummary>> {
        Ok(aggregations::campaign_summary(&self.read()?.events, campaign_id))
    }

    async fn owner_campaigns(&self, owner: &str) -> Result<Vec<CampaignSummary>> {
        Ok(aggregations::owner_campaigns(&self.read()?.events, owner))
    }

    async fn campaign_events(&self, campaign_id: i64, limit: i64) -> Result<Vec<EventRecord>> {
        Ok(aggregations::campaign_events(
            &self.read()?.events,
            campaign_id,
            limit_to_usize(limit),
        ))
    }

    async fn leaderboard(&self, campaign_id: i64, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        Ok(aggregations::leaderboard(
            &self.read()?.events,
            campaign_id,
            limit_to_usize(limit),
        ))
    }

    async fn activity(&self, limit: i64) -> Result<Vec<EventRecord>> {
        Ok(aggregations::activity(&self.read()?.events, limit_to_usize(limit)))
    }

    async fn donor_donations(&self, donor: &str, limit: i64) -> Result<Vec<DonorDonation>> {
        Ok(aggregations::donor_donations(
            &self.read()?.events,
            donor,
            limit_to_usize(limit),
        ))
    }

    async fn platform_stats(&self) -> Result<PlatformStats> {
        Ok(aggregations::platform_stats(&self.read()?.events))
    }
}
