// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod aggregations;
pub mod in_memory_store;
pub mod postgres_store;

use crate::db::postgres::models::fundraising_models::{
    chainhook_deliveries::ChainhookDelivery,
    fundraising_events::FundraisingEvent,
    fundraising_views::{CampaignSummary, DonorDonation, EventRecord, LeaderboardEntry, PlatformStats},
};
use anyhow::Result;
use std::{fmt::Debug, sync::Arc};

pub use in_memory_store::InMemoryStore;
pub use postgres_store::PostgresStore;

pub type ArcFundraisingStore = Arc<dyn FundraisingStore>;

/// Append-only event log plus the views derived from it. Inserts are keyed on `event_uid`
/// and return `false` when the row already existed; a conflict is never an error.
#[async_trait::async_trait]
pub trait FundraisingStore: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn health_check(&self) -> Result<()>;

    async fn insert_delivery(&self, delivery: ChainhookDelivery) -> Result<bool>;

    async fn insert_event(&self, event: FundraisingEvent) -> Result<bool>;

    async fn campaign_summaries(&self) -> Result<Vec<CampaignSummary>>;

    async fn campaign_summary(&self, campaign_id: i64) -> Result<Option<CampaignSummary>>;

    async fn owner_campaigns(&self, owner: &str) -> Result<Vec<CampaignSummary>>;

    async fn campaign_events(&self, campaign_id: i64, limit: i64) -> Result<Vec<EventRecord>>;

    async fn leaderboard(&self, campaign_id: i64, limit: i64) -> Result<Vec<LeaderboardEntry>>;

    async fn activity(&self, limit: i64) -> Result<Vec<EventRecord>>;

    async fn donor_donations(&self, donor: &str, limit: i64) -> Result<Vec<DonorDonation>>;

    async fn platform_stats(&self) -> Result<PlatformStats>;
}
