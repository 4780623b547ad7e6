// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    api,
    ingestion::{IngestionConfig, IngestionService},
    storage::{ArcFundraisingStore, InMemoryStore, PostgresStore},
    utils::database::{new_db_pool, run_migrations, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_POOL_SIZE},
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use server_framework::RunnableConfig;
use std::{net::SocketAddr, sync::Arc};

pub const DEFAULT_API_PORT: u16 = 4001;

/// Storage backend for the event log.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DbConfig {
    PostgresConfig(PostgresConfig),
    InMemoryConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    pub connection_string: String,
    // Limits the number of queries in flight; every event insert takes its own connection.
    #[serde(default = "PostgresConfig::default_db_pool_size")]
    pub db_pool_size: u32,
    #[serde(default = "PostgresConfig::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl PostgresConfig {
    pub const fn default_db_pool_size() -> u32 {
        DEFAULT_MAX_POOL_SIZE
    }

    pub const fn default_idle_timeout_secs() -> u64 {
        DEFAULT_IDLE_TIMEOUT_SECS
    }

    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            db_pool_size: Self::default_db_pool_size(),
            idle_timeout_secs: Self::default_idle_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    #[serde(default = "IndexerConfig::default_api_port")]
    pub api_port: u16,
    pub db_config: DbConfig,
    #[serde(default)]
    pub chainhook_auth_token: Option<String>,
    #[serde(default)]
    pub expected_contract_identifier: Option<String>,
}

/// Environment variables read once at startup.
pub const ENV_PORT: &str = "PORT";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_CHAINHOOK_AUTH_TOKEN: &str = "CHAINHOOK_AUTH_TOKEN";
pub const ENV_EXPECTED_CONTRACT_IDENTIFIER: &str = "EXPECTED_CONTRACT_IDENTIFIER";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl IndexerConfig {
    pub const fn default_api_port() -> u16 {
        DEFAULT_API_PORT
    }

    /// Layers environment overrides on top of the file config. `lookup` is `std::env::var`
    /// in production. Empty values count as unset.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = non_empty(lookup(ENV_PORT)) {
            self.api_port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", ENV_PORT, port))?;
        }
        if let Some(url) = non_empty(lookup(ENV_DATABASE_URL)) {
            self.db_config = match self.db_config {
                DbConfig::PostgresConfig(config) => DbConfig::PostgresConfig(PostgresConfig {
                    connection_string: url,
                    ..config
                }),
                DbConfig::InMemoryConfig => DbConfig::PostgresConfig(PostgresConfig::new(url)),
            };
        }
        if let Some(token) = non_empty(lookup(ENV_CHAINHOOK_AUTH_TOKEN)) {
            self.chainhook_auth_token = Some(token);
        }
        if let Some(contract) = non_empty(lookup(ENV_EXPECTED_CONTRACT_IDENTIFIER)) {
            self.expected_contract_identifier = Some(contract);
        }
        self.chainhook_auth_token = non_empty(self.chainhook_auth_token);
        self.expected_contract_identifier = non_empty(self.expected_contract_identifier);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if let DbConfig::PostgresConfig(config) = &self.db_config {
            if config.connection_string.trim().is_empty() {
                bail!("postgres_config.connection_string is required");
            }
            if config.db_pool_size == 0 {
                bail!("postgres_config.db_pool_size must be positive");
            }
        }
        Ok(())
    }

    pub fn ingestion_config(&self) -> IngestionConfig {
        IngestionConfig {
            auth_token: self.chainhook_auth_token.clone(),
            expected_contract_identifier: self.expected_contract_identifier.clone(),
        }
    }

    /// Connects the configured backend, running migrations for Postgres.
    pub async fn build_store(&self) -> Result<ArcFundraisingStore> {
        match &self.db_config {
            DbConfig::PostgresConfig(config) => {
                let pool = new_db_pool(
                    &config.connection_string,
                    Some(config.db_pool_size),
                    Some(config.idle_timeout_secs),
                )
                .await
                .context("Failed to create connection pool")?;
                run_migrations(config.connection_string.clone(), pool.clone())
                    .await
                    .context("Failed to run migrations")?;
                Ok(Arc::new(PostgresStore::new(pool)))
            },
            DbConfig::InMemoryConfig => Ok(Arc::new(InMemoryStore::new())),
        }
    }
}

#[async_trait::async_trait]
impl RunnableConfig for IndexerConfig {
    async fn run(&self) -> Result<()> {
        let config = self
            .clone()
            .with_env_overrides(|key| std::env::var(key).ok())
            .context("Invalid configuration")?;
        let store = config.build_store().await?;
        let db_type: &'static str = (&config.db_config).into();
        tracing::info!(
            api_port = config.api_port,
            db_type,
            auth_enabled = config.chainhook_auth_token.is_some(),
            expected_contract_identifier = config.expected_contract_identifier.as_deref().unwrap_or_default(),
            "[Indexer] Starting fundraising indexer",
        );
        let service = Arc::new(IngestionService::new(store, config.ingestion_config()));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
        warp::serve(api::routes(service)).run(addr).await;
        Ok(())
    }

    fn get_server_name(&self) -> String {
        "fundraising".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn from_yaml(yaml: &str) -> IndexerConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_postgres_config_defaults() {
        let config = from_yaml(
            r#"
db_config:
  type: postgres_config
  connection_string: postgres://localhost/fundraising
"#,
        );
        assert_eq!(config.api_port, 4001);
        assert_eq!(
            config.db_config,
            DbConfig::PostgresConfig(PostgresConfig {
                connection_string: "postgres://localhost/fundraising".to_string(),
                db_pool_size: 10,
                idle_timeout_secs: 30,
            })
        );
        assert_eq!(config.chainhook_auth_token, None);
    }

    #[test]
    fn test_in_memory_config() {
        let config = from_yaml(
            r#"
api_port: 5000
db_config:
  type: in_memory_config
chainhook_auth_token: secret
"#,
        );
        assert_eq!(config.api_port, 5000);
        assert_eq!(config.db_config, DbConfig::InMemoryConfig);
        let db_type: &'static str = (&config.db_config).into();
        assert_eq!(db_type, "in_memory_config");
    }

    #[test]
    fn test_env_overrides() {
        let config = from_yaml("db_config:\n  type: in_memory_config\n")
            .with_env_overrides(env(&[
                ("PORT", "8080"),
                ("DATABASE_URL", "postgres://db/fundraising"),
                ("CHAINHOOK_AUTH_TOKEN", "s3cret"),
                ("EXPECTED_CONTRACT_IDENTIFIER", "SP1.fundraising"),
            ]))
            .unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(
            config.db_config,
            DbConfig::PostgresConfig(PostgresConfig::new("postgres://db/fundraising".to_string()))
        );
        assert_eq!(config.chainhook_auth_token.as_deref(), Some("s3cret"));
        assert_eq!(
            config.ingestion_config().expected_contract_identifier.as_deref(),
            Some("SP1.fundraising")
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = from_yaml("db_config:\n  type: in_memory_config\nchainhook_auth_token: \"\"\n")
            .with_env_overrides(env(&[("CHAINHOOK_AUTH_TOKEN", ""), ("PORT", " ")]))
            .unwrap();
        assert_eq!(config.chainhook_auth_token, None);
        assert_eq!(config.api_port, 4001);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let empty_connection = from_yaml(
            "db_config:\n  type: postgres_config\n  connection_string: \"\"\n",
        );
        assert!(empty_connection.with_env_overrides(env(&[])).is_err());

        let bad_port = from_yaml("db_config:\n  type: in_memory_config\n");
        assert!(bad_port.with_env_overrides(env(&[("PORT", "http")])).is_err());

        assert!(serde_yaml::from_str::<IndexerConfig>(
            "db_config:\n  type: in_memory_config\nunknown: 1\n"
        )
        .is_err());
    }
}
