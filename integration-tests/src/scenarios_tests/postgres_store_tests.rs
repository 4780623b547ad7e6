// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Runs against a fresh `postgres:14` container per test, so Docker must be available.

#[cfg(test)]
mod test {
    use crate::{
        fixture, PostgresTestContext, TestContext, CAMPAIGN_LIFECYCLE_DELIVERY,
        DONATION_STX_DELIVERY,
    };
    use futures::future::join_all;
    use processor::{ingestion::IngestionConfig, storage::FundraisingStore};
    use warp::http::StatusCode;

    #[tokio::test]
    async fn test_postgres_idempotent_ingestion() {
        let postgres = PostgresTestContext::new().await.unwrap();
        let store = postgres.create_store().await.unwrap();
        let context = TestContext::with_store(store.clone(), IngestionConfig::default());
        let payload = fixture(DONATION_STX_DELIVERY);

        for _ in 0..2 {
            let (status, body) = context.post_chainhook(&payload, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["extractedEvents"], 1);
        }

        let summary = store.campaign_summary(9).await.unwrap().unwrap();
        assert_eq!(summary.total_stx, "1000");
        assert_eq!(summary.donation_count, 1);
        assert_eq!(store.activity(100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_postgres_aggregations_match_lifecycle() {
        let postgres = PostgresTestContext::new().await.unwrap();
        let store = postgres.create_store().await.unwrap();
        let context = TestContext::with_store(store.clone(), IngestionConfig::default());
        for delivery in [CAMPAIGN_LIFECYCLE_DELIVERY, DONATION_STX_DELIVERY] {
            let (status, _) = context.post_chainhook(&fixture(delivery), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let summary = store.campaign_summary(7).await.unwrap().unwrap();
        assert_eq!(summary.owner.as_deref(), Some("SPOWNER"));
        assert_eq!(summary.total_stx, "3000");
        assert_eq!(summary.total_sbtc, "40");
        assert!(summary.is_withdrawn);

        let board = store.leaderboard(7, 20).await.unwrap();
        let donors: Vec<_> = board.iter().map(|e| e.donor.as_str()).collect();
        assert_eq!(donors, vec!["SPALICE", "SPBOB"]);

        let stats = store.platform_stats().await.unwrap();
        assert_eq!(stats.total_stx_raised, "4000");
        assert_eq!(stats.unique_donors, 3);

        let (status, body) = context.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    // NUL bytes are rejected by Postgres text/jsonb; the insert is retried with them removed.
    #[tokio::test]
    async fn test_postgres_strips_null_bytes() {
        let postgres = PostgresTestContext::new().await.unwrap();
        let store = postgres.create_store().await.unwrap();
        let context = TestContext::with_store(store.clone(), IngestionConfig::default());
        let mut payload = fixture(DONATION_STX_DELIVERY);
        payload["network"] = serde_json::json!("main\u{0000}net");

        let (status, _) = context.post_chainhook(&payload, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.campaign_summary(9).await.unwrap().is_some());
    }

    // Test Case: the same delivery arrives on several connections at once.
    // - Every request is acknowledged, the unique index on event_uid keeps one row of each.
    #[tokio::test]
    async fn test_postgres_concurrent_duplicate_deliveries() {
        let postgres = PostgresTestContext::new().await.unwrap();
        let store = postgres.create_store().await.unwrap();
        let context = TestContext::with_store(store.clone(), IngestionConfig::default());
        let payload = fixture(DONATION_STX_DELIVERY);

        let responses = join_all((0..8).map(|_| context.post_chainhook(&payload, None))).await;
        for (status, body) in responses {
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["extractedEvents"], 1);
        }

        let summary = store.campaign_summary(9).await.unwrap().unwrap();
        assert_eq!(summary.donation_count, 1);
        assert_eq!(summary.total_stx, "1000");
        assert_eq!(store.activity(100).await.unwrap().len(), 1);
    }
}
