// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use processor::{
    api,
    ingestion::{IngestionConfig, IngestionService},
    storage::{ArcFundraisingStore, InMemoryStore, PostgresStore},
    utils::database::{new_db_pool, run_migrations},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use warp::http::StatusCode;

mod scenarios_tests;

pub const DONATION_STX_DELIVERY: &[u8] = include_bytes!("../fixtures/chainhook_donation_stx.json");
pub const CAMPAIGN_LIFECYCLE_DELIVERY: &[u8] =
    include_bytes!("../fixtures/chainhook_campaign_lifecycle.json");
pub const UNRELATED_CONTRACT_DELIVERY: &[u8] =
    include_bytes!("../fixtures/chainhook_unrelated_contract.json");

pub const FUNDRAISING_CONTRACT: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.fundraising";

pub fn fixture(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("fixture is valid JSON")
}

/// Drives the full route tree in process with `warp::test`.
pub struct TestContext {
    pub service: Arc<IngestionService>,
    /// Set when the context was built over the in-memory backend.
    pub in_memory: Option<Arc<InMemoryStore>>,
}

impl TestContext {
    pub fn new(config: IngestionConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let mut context = Self::with_store(store.clone(), config);
        context.in_memory = Some(store);
        context
    }

    pub fn with_store(store: ArcFundraisingStore, config: IngestionConfig) -> Self {
        Self {
            service: Arc::new(IngestionService::new(store, config)),
            in_memory: None,
        }
    }

    pub fn in_memory_store(&self) -> &InMemoryStore {
        self.in_memory
            .as_deref()
            .expect("context was not built over the in-memory store")
    }

    pub async fn post_chainhook(&self, body: &Value, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut request = warp::test::request()
            .method("POST")
            .path("/chainhook")
            .json(body);
        if let Some(authorization) = authorization {
            request = request.header("authorization", authorization);
        }
        let response = request.reply(&api::routes(self.service.clone())).await;
        (response.status(), parse_body(response.body()))
    }

    pub async fn post_raw(&self, path: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let response = warp::test::request()
            .method("POST")
            .path(path)
            .header("content-type", "application/json")
            .body(body)
            .reply(&api::routes(self.service.clone()))
            .await;
        (response.status(), parse_body(response.body()))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&api::routes(self.service.clone()))
            .await;
        (response.status(), parse_body(response.body()))
    }
}

fn parse_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

/// A throwaway Postgres for exercising `PostgresStore`. The container is stopped when this
/// is dropped, so keep it alive for the whole test.
pub struct PostgresTestContext {
    postgres_container: ContainerAsync<GenericImage>,
}

impl PostgresTestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let postgres_container = GenericImage::new("postgres", "14")
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_DB", "postgres")
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await
            .context("Failed to start postgres container")?;
        Ok(Self { postgres_container })
    }

    pub async fn get_db_url(&self) -> anyhow::Result<String> {
        let host = self.postgres_container.get_host().await?;
        let port = self.postgres_container.get_host_port_ipv4(5432).await?;
        Ok(format!("postgres://postgres:postgres@{host}:{port}/postgres"))
    }

    /// Migrates the database and returns a store over it.
    pub async fn create_store(&self) -> anyhow::Result<Arc<PostgresStore>> {
        let db_url = self.get_db_url().await?;
        let pool = new_db_pool(&db_url, Some(16), None).await?;
        // The image restarts once after init, so the first connection attempts may be refused.
        let mut attempts = 0;
        loop {
            match run_migrations(db_url.clone(), pool.clone()).await {
                Ok(()) => break,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(250)).await;
                },
                Err(e) => return Err(e),
            }
        }
        Ok(Arc::new(PostgresStore::new(pool)))
    }
}
