// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::FundraisingStore;
use crate::{
    db::postgres::models::fundraising_models::{
        chainhook_deliveries::ChainhookDelivery,
        fundraising_events::FundraisingEvent,
        fundraising_views::{
            CampaignSummary, DonorDonation, EventRecord, LeaderboardEntry, PlatformStats,
        },
    },
    schema,
    utils::database::{get_connection, insert_or_retry_cleaned, ArcDbPool},
};
use anyhow::{Context, Result};
use diesel::{
    pg::Pg,
    query_builder::{QueryFragment, QueryId},
    sql_types::{BigInt, Text},
};
use diesel_async::RunQueryDsl;

const SUMMARY_SELECT: &str = "
SELECT
    campaign_id,
    MAX(CASE WHEN event_name = 'campaign-created' THEN owner END) AS owner,
    MAX(CASE WHEN event_name = 'campaign-created' THEN beneficiary END) AS beneficiary,
    COUNT(CASE WHEN event_name LIKE 'donated-%' THEN 1 END)::int AS donation_count,
    COALESCE(SUM(CASE WHEN event_name = 'donated-stx' THEN amount ELSE 0 END), 0)::text AS total_stx,
    COALESCE(SUM(CASE WHEN event_name = 'donated-sbtc' THEN amount ELSE 0 END), 0)::text AS total_sbtc,
    COALESCE(BOOL_OR(event_name = 'campaign-cancelled'), false) AS is_cancelled,
    COALESCE(BOOL_OR(event_name = 'campaign-withdrawn'), false) AS is_withdrawn,
    MIN(inserted_at) AS created_at
FROM fundraising_events";

const EVENT_RECORD_COLUMNS: &str = "
    event_name, campaign_id, donor, owner, beneficiary, amount::text AS amount, token, txid,
    block_height, inserted_at";

fn all_summaries_query() -> String {
    format!(
        "{} WHERE campaign_id IS NOT NULL GROUP BY campaign_id ORDER BY campaign_id DESC",
        SUMMARY_SELECT
    )
}

fn one_summary_query() -> String {
    format!("{} WHERE campaign_id = $1 GROUP BY campaign_id", SUMMARY_SELECT)
}

fn owner_summaries_query() -> String {
    format!(
        "{} WHERE campaign_id IN (
            SELECT DISTINCT campaign_id FROM fundraising_events
            WHERE event_name = 'campaign-created' AND owner = $1
        )
        GROUP BY campaign_id ORDER BY campaign_id DESC",
        SUMMARY_SELECT
    )
}

fn campaign_events_query() -> String {
    format!(
        "SELECT {} FROM fundraising_events WHERE campaign_id = $1
        ORDER BY inserted_at DESC, id DESC LIMIT $2",
        EVENT_RECORD_COLUMNS
    )
}

fn activity_query() -> String {
    format!(
        "SELECT {} FROM fundraising_events ORDER BY inserted_at DESC, id DESC LIMIT $1",
        EVENT_RECORD_COLUMNS
    )
}

const LEADERBOARD_QUERY: &str = "
SELECT
    donor,
    COALESCE(SUM(CASE WHEN event_name = 'donated-stx' THEN amount ELSE 0 END), 0)::text AS total_stx,
    COALESCE(SUM(CASE WHEN event_name = 'donated-sbtc' THEN amount ELSE 0 END), 0)::text AS total_sbtc,
    COUNT(*)::int AS donation_count
FROM fundraising_events
WHERE campaign_id = $1 AND event_name LIKE 'donated-%' AND donor IS NOT NULL
GROUP BY donor
ORDER BY
    COALESCE(SUM(CASE WHEN event_name = 'donated-stx' THEN amount ELSE 0 END), 0) DESC,
    COALESCE(SUM(CASE WHEN event_name = 'donated-sbtc' THEN amount ELSE 0 END), 0) DESC,
    donor ASC
LIMIT $2";

const DONOR_DONATIONS_QUERY: &str = "
SELECT campaign_id, event_name, amount::text AS amount, txid, block_height, inserted_at
FROM fundraising_events
WHERE donor = $1 AND event_name LIKE 'donated-%'
ORDER BY inserted_at DESC, id DESC
LIMIT $2";

const PLATFORM_STATS_QUERY: &str = "
SELECT
    COUNT(DISTINCT campaign_id) FILTER (WHERE event_name = 'campaign-created')::int AS total_campaigns,
    COUNT(DISTINCT campaign_id) FILTER (WHERE event_name = 'campaign-withdrawn')::int AS campaigns_funded,
    COALESCE(SUM(CASE WHEN event_name = 'donated-stx' THEN amount ELSE 0 END), 0)::text AS total_stx_raised,
    COALESCE(SUM(CASE WHEN event_name = 'donated-sbtc' THEN amount ELSE 0 END), 0)::text AS total_sbtc_raised,
    COUNT(DISTINCT donor) FILTER (WHERE event_name LIKE 'donated-%')::int AS unique_donors,
    COUNT(*) FILTER (WHERE event_name LIKE 'donated-%')::int AS total_donations
FROM fundraising_events";

fn insert_chainhook_delivery_query(
    item: ChainhookDelivery,
) -> impl QueryFragment<Pg> + QueryId + Send {
    use schema::chainhook_deliveries::dsl::*;

    diesel::insert_into(schema::chainhook_deliveries::table)
        .values(item)
        .on_conflict(event_uid)
        .do_nothing()
}

fn insert_fundraising_event_query(item: FundraisingEvent) -> impl QueryFragment<Pg> + QueryId + Send {
    use schema::fundraising_events::dsl::*;

    diesel::insert_into(schema::fundraising_events::table)
        .values(item)
        .on_conflict(event_uid)
        .do_nothing()
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: ArcDbPool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("PostgresStore")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl PostgresStore {
    pub fn new(pool: ArcDbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ArcDbPool {
        &self.pool
    }
}

macro_rules! log_query_error {
    ($query:expr) => {
        |e: diesel::result::Error| {
            tracing::error!(error = ?e, query = %$query, "Fundraising read query failed");
            e
        }
    };
}

#[async_trait::async_trait]
impl FundraisingStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<()> {
        let conn = &mut get_connection(&self.pool).await?;
        diesel::sql_query("SELECT 1")
            .execute(conn)
            .await
            .context("Health check query failed")?;
        Ok(())
    }

    async fn insert_delivery(&self, delivery: ChainhookDelivery) -> Result<bool> {
        let rows =
            insert_or_retry_cleaned(self.pool.clone(), insert_chainhook_delivery_query, delivery)
                .await
                .context("Failed to insert chainhook delivery")?;
        Ok(rows > 0)
    }

    async fn insert_event(&self, event: FundraisingEvent) -> Result<bool> {
        let rows =
            insert_or_retry_cleaned(self.pool.clone(), insert_fundraising_event_query, event)
                .await
                .context("Failed to insert fundraising event")?;
        Ok(rows > 0)
    }

    async fn campaign_summaries(&self) -> Result<Vec<CampaignSummary>> {
        let query = all_summaries_query();
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(&query)
            .load::<CampaignSummary>(conn)
            .await
            .map_err(log_query_error!(query))?)
    }

    async fn campaign_summary(&self, campaign_id: i64) -> Result<Option<CampaignSummary>> {
        let query = one_summary_query();
        let conn = &mut get_connection(&self.pool).await?;
        let mut rows = diesel::sql_query(&query)
            .bind::<BigInt, _>(campaign_id)
            .load::<CampaignSummary>(conn)
            .await
            .map_err(log_query_error!(query))?;
        Ok(rows.pop())
    }

    async fn owner_campaigns(&self, owner: &str) -> Result<Vec<CampaignSummary>> {
        let query = owner_summaries_query();
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(&query)
            .bind::<Text, _>(owner)
            .load::<CampaignSummary>(conn)
            .await
            .map_err(log_query_error!(query))?)
    }

    async fn campaign_events(&self, campaign_id: i64, limit: i64) -> Result<Vec<EventRecord>> {
        let query = campaign_events_query();
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(&query)
            .bind::<BigInt, _>(campaign_id)
            .bind::<BigInt, _>(limit)
            .load::<EventRecord>(conn)
            .await
            .map_err(log_query_error!(query))?)
    }

    async fn leaderboard(&self, campaign_id: i64, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(LEADERBOARD_QUERY)
            .bind::<BigInt, _>(campaign_id)
            .bind::<BigInt, _>(limit)
            .load::<LeaderboardEntry>(conn)
            .await
            .map_err(log_query_error!(LEADERBOARD_QUERY))?)
    }

    async fn activity(&self, limit: i64) -> Result<Vec<EventRecord>> {
        let query = activity_query();
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(&query)
            .bind::<BigInt, _>(limit)
            .load::<EventRecord>(conn)
            .await
            .map_err(log_query_error!(query))?)
    }

    async fn donor_donations(&self, donor: &str, limit: i64) -> Result<Vec<DonorDonation>> {
        let conn = &mut get_connection(&self.pool).await?;
        Ok(diesel::sql_query(DONOR_DONATIONS_QUERY)
            .bind::<Text, _>(donor)
            .bind::<BigInt, _>(limit)
            .load::<DonorDonation>(conn)
            .await
            .map_err(log_query_error!(DONOR_DONATIONS_QUERY))?)
    }

    async fn platform_stats(&self) -> Result<PlatformStats> {
        let conn = &mut get_connection(&self.pool).await?;
        let mut rows = diesel::sql_query(PLATFORM_STATS_QUERY)
            .load::<PlatformStats>(conn)
            .await
            .map_err(log_query_error!(PLATFORM_STATS_QUERY))?;
        rows.pop().context("Platform stats query returned no rows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_queries_share_select() {
        for query in [all_summaries_query(), one_summary_query(), owner_summaries_query()] {
            assert!(query.starts_with(SUMMARY_SELECT));
            assert!(query.contains("GROUP BY campaign_id"));
        }
        assert!(all_summaries_query().ends_with("ORDER BY campaign_id DESC"));
    }

    #[test]
    fn test_insert_query_ignores_conflicts() {
        let delivery = ChainhookDelivery::from_payload(&serde_json::json!({"uuid": "x"}));
        let sql = diesel::debug_query::<Pg, _>(&insert_chainhook_delivery_query(delivery)).to_string();
        assert!(sql.starts_with(r#"INSERT INTO "chainhook_deliveries""#));
        assert!(sql.contains(r#"ON CONFLICT ("event_uid") DO NOTHING"#));
    }
}
