// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Folds over the event log that produce the read views. The Postgres store computes the
//! same views in SQL; these are what the in-memory store serves.

use crate::db::postgres::models::fundraising_models::{
    fundraising_events::{
        FundraisingEventQuery, CAMPAIGN_CANCELLED, CAMPAIGN_CREATED, CAMPAIGN_WITHDRAWN,
        DONATED_SBTC, DONATED_STX,
    },
    fundraising_views::{CampaignSummary, DonorDonation, EventRecord, LeaderboardEntry, PlatformStats},
};
use ahash::{AHashMap, AHashSet};
use bigdecimal::{BigDecimal, Zero};
use std::collections::BTreeMap;

/// Running per-asset totals. Rows whose name matches neither asset contribute zero.
#[derive(Clone, Debug, Default)]
struct AssetTotals {
    stx: BigDecimal,
    sbtc: BigDecimal,
}

impl AssetTotals {
    fn add(&mut self, event: &FundraisingEventQuery) {
        let amount = match &event.amount {
            Some(amount) => amount,
            None => return,
        };
        if event.event_name == DONATED_STX {
            self.stx += amount;
        } else if event.event_name == DONATED_SBTC {
            self.sbtc += amount;
        }
    }
}

fn render(amount: &BigDecimal) -> String {
    if amount.is_zero() {
        "0".to_string()
    } else {
        amount.to_string()
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn summarize(campaign_id: i64, events: &[&FundraisingEventQuery]) -> Option<CampaignSummary> {
    let created_at = events.iter().map(|e| e.inserted_at).min()?;
    let mut totals = AssetTotals::default();
    let mut owner: Option<&String> = None;
    let mut beneficiary: Option<&String> = None;
    let mut donation_count = 0;
    let mut is_cancelled = false;
    let mut is_withdrawn = false;
    for event in events {
        totals.add(event);
        match event.event_name.as_str() {
            CAMPAIGN_CREATED => {
                owner = owner.max(event.owner.as_ref());
                beneficiary = beneficiary.max(event.beneficiary.as_ref());
            },
            CAMPAIGN_CANCELLED => is_cancelled = true,
            CAMPAIGN_WITHDRAWN => is_withdrawn = true,
            _ => {},
        }
        if event.is_donation() {
            donation_count += 1;
        }
    }
    Some(CampaignSummary {
        campaign_id,
        owner: owner.cloned(),
        beneficiary: beneficiary.cloned(),
        donation_count: count(donation_count),
        total_stx: render(&totals.stx),
        total_sbtc: render(&totals.sbtc),
        is_cancelled,
        is_withdrawn,
        created_at,
    })
}

fn group_by_campaign(events: &[FundraisingEventQuery]) -> BTreeMap<i64, Vec<&FundraisingEventQuery>> {
    let mut grouped: BTreeMap<i64, Vec<&FundraisingEventQuery>> = BTreeMap::new();
    for event in events {
        if let Some(campaign_id) = event.campaign_id {
            grouped.entry(campaign_id).or_default().push(event);
        }
    }
    grouped
}

/// All campaigns, highest id first.
pub fn campaign_summaries(events: &[FundraisingEventQuery]) -> Vec<CampaignSummary> {
    group_by_campaign(events)
        .into_iter()
        .rev()
        .filter_map(|(campaign_id, events)| summarize(campaign_id, &events))
        .collect()
}

/// `None` when no event mentions the campaign.
pub fn campaign_summary(events: &[FundraisingEventQuery], campaign_id: i64) -> Option<CampaignSummary> {
    let matching: Vec<_> = events
        .iter()
        .filter(|e| e.campaign_id == Some(campaign_id))
        .collect();
    summarize(campaign_id, &matching)
}

pub fn owner_campaigns(events: &[FundraisingEventQuery], owner: &str) -> Vec<CampaignSummary> {
    let owned: AHashSet<i64> = events
        .iter()
        .filter(|e| e.event_name == CAMPAIGN_CREATED && e.owner.as_deref() == Some(owner))
        .filter_map(|e| e.campaign_id)
        .collect();
    campaign_summaries(events)
        .into_iter()
        .filter(|summary| owned.contains(&summary.campaign_id))
        .collect()
}

/// Newest first. Rows inserted in the same instant fall back to insertion order.
fn newest_first<'a>(
    events: impl Iterator<Item = &'a FundraisingEventQuery>,
    limit: usize,
) -> Vec<&'a FundraisingEventQuery> {
    let mut rows: Vec<_> = events.collect();
    rows.sort_by(|a, b| b.inserted_at.cmp(&a.inserted_at).then(b.id.cmp(&a.id)));
    rows.truncate(limit);
    rows
}

fn to_record(event: &FundraisingEventQuery) -> EventRecord {
    EventRecord {
        event_name: event.event_name.clone(),
        campaign_id: event.campaign_id,
        donor: event.donor.clone(),
        owner: event.owner.clone(),
        beneficiary: event.beneficiary.clone(),
        amount: event.amount.as_ref().map(BigDecimal::to_string),
        token: event.token.clone(),
        txid: event.txid.clone(),
        block_height: event.block_height,
        inserted_at: event.inserted_at,
    }
}

pub fn campaign_events(
    events: &[FundraisingEventQuery],
    campaign_id: i64,
    limit: usize,
) -> Vec<EventRecord> {
    newest_first(
        events.iter().filter(|e| e.campaign_id == Some(campaign_id)),
        limit,
    )
    .into_iter()
    .map(to_record)
    .collect()
}

pub fn activity(events: &[FundraisingEventQuery], limit: usize) -> Vec<EventRecord> {
    newest_first(events.iter(), limit)
        .into_iter()
        .map(to_record)
        .collect()
}

pub fn donor_donations(
    events: &[FundraisingEventQuery],
    donor: &str,
    limit: usize,
) -> Vec<DonorDonation> {
    newest_first(
        events
            .iter()
            .filter(|e| e.is_donation() && e.donor.as_deref() == Some(donor)),
        limit,
    )
    .into_iter()
    .map(|event| DonorDonation {
        campaign_id: event.campaign_id,
        event_name: event.event_name.clone(),
        amount: event.amount.as_ref().map(BigDecimal::to_string),
        txid: event.txid.clone(),
        block_height: event.block_height,
        inserted_at: event.inserted_at,
    })
    .collect()
}

/// Per-donor totals for one campaign: STX total descending, then sBTC total descending,
/// then donor ascending.
pub fn leaderboard(
    events: &[FundraisingEventQuery],
    campaign_id: i64,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut by_donor: AHashMap<&str, (AssetTotals, usize)> = AHashMap::new();
    for event in events
        .iter()
        .filter(|e| e.campaign_id == Some(campaign_id) && e.is_donation())
    {
        if let Some(donor) = event.donor.as_deref() {
            let (totals, n) = by_donor.entry(donor).or_default();
            totals.add(event);
            *n += 1;
        }
    }
    let mut rows: Vec<_> = by_donor.into_iter().collect();
    rows.sort_by(|(donor_a, (a, _)), (donor_b, (b, _))| {
        b.stx
            .cmp(&a.stx)
            .then_with(|| b.sbtc.cmp(&a.sbtc))
            .then_with(|| donor_a.cmp(donor_b))
    });
    rows.into_iter()
        .take(limit)
        .map(|(donor, (totals, n))| LeaderboardEntry {
            donor: donor.to_string(),
            total_stx: render(&totals.stx),
            total_sbtc: render(&totals.sbtc),
            donation_count: count(n),
        })
        .collect()
}

pub fn platform_stats(events: &[FundraisingEventQuery]) -> PlatformStats {
    let mut created = AHashSet::new();
    let mut withdrawn = AHashSet::new();
    let mut donors = AHashSet::new();
    let mut totals = AssetTotals::default();
    let mut donations = 0;
    for event in events {
        totals.add(event);
        match (event.event_name.as_str(), event.campaign_id) {
            (CAMPAIGN_CREATED, Some(id)) => {
                created.insert(id);
            },
            (CAMPAIGN_WITHDRAWN, Some(id)) => {
                withdrawn.insert(id);
            },
            _ => {},
        }
        if event.is_donation() {
            donations += 1;
            if let Some(donor) = event.donor.as_deref() {
                donors.insert(donor);
            }
        }
    }
    PlatformStats {
        total_campaigns: count(created.len()),
        campaigns_funded: count(withdrawn.len()),
        total_stx_raised: render(&totals.stx),
        total_sbtc_raised: render(&totals.sbtc),
        unique_donors: count(donors.len()),
        total_donations: count(donations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;
    use std::str::FromStr;

    fn at(secs: i64) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1_700_000_000 + secs, 0)
            .unwrap()
            .naive_utc()
    }

    fn event(
        id: i64,
        campaign_id: i64,
        event_name: &str,
        amount: Option<&str>,
        donor: Option<&str>,
    ) -> FundraisingEventQuery {
        FundraisingEventQuery {
            id,
            event_uid: format!("uid-{}", id),
            event_name: event_name.to_string(),
            campaign_id: Some(campaign_id),
            donor: donor.map(str::to_string),
            owner: None,
            beneficiary: None,
            token: None,
            amount: amount.map(|a| BigDecimal::from_str(a).unwrap()),
            ts: None,
            txid: Some(format!("0x{:02}", id)),
            block_height: Some(100 + id),
            contract_identifier: None,
            raw: json!({}),
            inserted_at: at(id),
        }
    }

    fn created(id: i64, campaign_id: i64, owner: &str) -> FundraisingEventQuery {
        let mut e = event(id, campaign_id, CAMPAIGN_CREATED, None, None);
        e.owner = Some(owner.to_string());
        e.beneficiary = Some(format!("{}-beneficiary", owner));
        e
    }

    #[test]
    fn test_two_donations_from_one_donor() {
        let events = vec![
            event(1, 1, DONATED_STX, Some("5000"), Some("A")),
            event(2, 1, DONATED_STX, Some("3000"), Some("A")),
        ];
        let summary = campaign_summary(&events, 1).unwrap();
        assert_eq!(summary.total_stx, "8000");
        assert_eq!(summary.total_sbtc, "0");
        assert_eq!(summary.donation_count, 2);
        assert_eq!(summary.created_at, at(1));

        let board = leaderboard(&events, 1, 20);
        assert_eq!(board, vec![LeaderboardEntry {
            donor: "A".to_string(),
            total_stx: "8000".to_string(),
            total_sbtc: "0".to_string(),
            donation_count: 2,
        }]);
    }

    #[test]
    fn test_summary_lifecycle_flags_and_owner() {
        let events = vec![
            created(1, 4, "SPOWNER"),
            event(2, 4, DONATED_SBTC, Some("25"), Some("B")),
            event(3, 4, "refunded", Some("25"), Some("B")),
            event(4, 4, CAMPAIGN_CANCELLED, None, None),
        ];
        let summary = campaign_summary(&events, 4).unwrap();
        assert_eq!(summary.owner.as_deref(), Some("SPOWNER"));
        assert_eq!(summary.beneficiary.as_deref(), Some("SPOWNER-beneficiary"));
        assert_eq!(summary.total_sbtc, "25");
        assert_eq!(summary.donation_count, 1);
        assert!(summary.is_cancelled);
        assert!(!summary.is_withdrawn);
    }

    #[test]
    fn test_missing_campaign() {
        let events = vec![event(1, 1, DONATED_STX, Some("1"), Some("A"))];
        assert!(campaign_summary(&events, 2).is_none());
    }

    #[test]
    fn test_summaries_newest_campaign_first() {
        let events = vec![created(1, 1, "A"), created(2, 3, "B"), created(3, 2, "A")];
        let ids: Vec<_> = campaign_summaries(&events).iter().map(|s| s.campaign_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let owned: Vec<_> = owner_campaigns(&events, "A").iter().map(|s| s.campaign_id).collect();
        assert_eq!(owned, vec![2, 1]);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let events = vec![
            event(1, 1, DONATED_STX, Some("100"), Some("C")),
            event(2, 1, DONATED_STX, Some("100"), Some("B")),
            event(3, 1, DONATED_SBTC, Some("5"), Some("C")),
            event(4, 1, DONATED_STX, Some("900"), Some("A")),
            event(5, 1, DONATED_STX, Some("100"), Some("D")),
            event(6, 1, DONATED_STX, Some("7"), None),
            event(7, 2, DONATED_STX, Some("9999"), Some("E")),
        ];
        let donors: Vec<_> = leaderboard(&events, 1, 20).into_iter().map(|e| e.donor).collect();
        assert_eq!(donors, vec!["A", "C", "B", "D"]);
        assert_eq!(leaderboard(&events, 1, 2).len(), 2);
    }

    #[test]
    fn test_event_lists_newest_first_and_limited() {
        let events = vec![
            created(1, 1, "A"),
            event(2, 1, DONATED_STX, Some("10"), Some("D")),
            event(3, 2, DONATED_STX, Some("20"), Some("D")),
            event(4, 1, DONATED_SBTC, Some("30"), Some("E")),
        ];
        let names: Vec<_> = campaign_events(&events, 1, 50)
            .into_iter()
            .map(|e| e.event_name)
            .collect();
        assert_eq!(names, vec![DONATED_SBTC, DONATED_STX, CAMPAIGN_CREATED]);

        let feed = activity(&events, 2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].campaign_id, Some(1));
        assert_eq!(feed[1].campaign_id, Some(2));

        let donations = donor_donations(&events, "D", 50);
        assert_eq!(donations.len(), 2);
        assert_eq!(donations[0].amount.as_deref(), Some("20"));
        assert_eq!(donations[1].amount.as_deref(), Some("10"));
    }

    #[test]
    fn test_platform_stats() {
        let events = vec![
            created(1, 1, "A"),
            created(2, 2, "A"),
            event(3, 1, DONATED_STX, Some("10"), Some("D")),
            event(4, 2, DONATED_STX, Some("15"), Some("D")),
            event(5, 2, DONATED_SBTC, Some("3"), Some("E")),
            event(6, 2, CAMPAIGN_WITHDRAWN, None, None),
            event(7, 2, CAMPAIGN_WITHDRAWN, None, None),
        ];
        assert_eq!(platform_stats(&events), PlatformStats {
            total_campaigns: 2,
            campaigns_funded: 1,
            total_stx_raised: "25".to_string(),
            total_sbtc_raised: "3".to_string(),
            unique_donors: 2,
            total_donations: 3,
        });
    }

    #[test]
    fn test_empty_log() {
        assert!(campaign_summaries(&[]).is_empty());
        assert_eq!(platform_stats(&[]).total_stx_raised, "0");
    }
}
