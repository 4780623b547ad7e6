// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Database-related functions
#![allow(clippy::extra_unused_lifetimes)]

use crate::utils::{
    counters::{GOT_CONNECTION_COUNT, UNABLE_TO_GET_CONNECTION_COUNT},
    util::remove_null_bytes,
};
use anyhow::Context;
use diesel::{
    backend::Backend,
    query_builder::{QueryFragment, QueryId},
    result::{DatabaseErrorKind, Error as DieselError},
    ConnectionError, ConnectionResult, QueryResult,
};
use diesel_async::{
    pg::AsyncPgConnection,
    pooled_connection::{
        bb8::{Pool, PooledConnection},
        AsyncDieselConnectionManager, ManagerConfig, PoolError,
    },
    RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use futures_util::{future::BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{sync::Arc, time::Duration};

pub type MyDbConnection = AsyncPgConnection;
pub type DbPool = Pool<MyDbConnection>;
pub type ArcDbPool = Arc<DbPool>;
pub type DbPoolConnection<'a> = PooledConnection<'a, MyDbConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/postgres/migrations");

pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

static INSERT_TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"INSERT INTO "(?P<table_name>\w+)"\s*\("#).expect("static regex is valid")
});

fn establish_connection(database_url: &str) -> BoxFuture<ConnectionResult<AsyncPgConnection>> {
    use native_tls::{Certificate, TlsConnector};
    use postgres_native_tls::MakeTlsConnector;

    (async move {
        let bad = |msg: String| ConnectionError::BadConnection(msg);
        let (url, cert_path) = parse_and_clean_db_url(database_url)
            .map_err(|e| ConnectionError::InvalidConnectionUrl(e.to_string()))?;
        let cert_path = cert_path.ok_or_else(|| bad("sslrootcert missing".to_string()))?;
        let cert = std::fs::read(&cert_path)
            .map_err(|e| bad(format!("Could not read certificate {}: {}", cert_path, e)))?;
        let cert = Certificate::from_pem(&cert)
            .map_err(|e| bad(format!("Could not parse certificate: {}", e)))?;
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .add_root_certificate(cert)
            .build()
            .map_err(|e| bad(format!("Could not build TLS connector: {}", e)))?;
        let connector = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(&url, connector)
            .await
            .map_err(|e| bad(format!("Could not connect to database: {}", e)))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = ?e, "Postgres connection error");
            }
        });
        AsyncPgConnection::try_from(client).await
    })
    .boxed()
}

/// Splits `sslrootcert` out of the query string, since tokio-postgres does not understand it.
fn parse_and_clean_db_url(url: &str) -> Result<(String, Option<String>), url::ParseError> {
    let mut db_url = url::Url::parse(url)?;
    let mut cert_path = None;

    let mut query = "".to_string();
    db_url.query_pairs().for_each(|(k, v)| {
        if k == "sslrootcert" {
            cert_path = Some(v.to_string());
        } else {
            query.push_str(&format!("{}={}&", k, v));
        }
    });
    db_url.set_query(Some(&query));

    Ok((db_url.to_string(), cert_path))
}

pub async fn new_db_pool(
    database_url: &str,
    max_pool_size: Option<u32>,
    idle_timeout_secs: Option<u64>,
) -> anyhow::Result<ArcDbPool> {
    let (_url, cert_path) =
        parse_and_clean_db_url(database_url).context("Could not parse database url")?;

    let config = if cert_path.is_some() {
        let mut config = ManagerConfig::<AsyncPgConnection>::default();
        config.custom_setup = Box::new(|conn| Box::pin(establish_connection(conn)));
        AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(database_url, config)
    } else {
        AsyncDieselConnectionManager::<MyDbConnection>::new(database_url)
    };
    let pool = Pool::builder()
        .max_size(max_pool_size.unwrap_or(DEFAULT_MAX_POOL_SIZE))
        .idle_timeout(Some(Duration::from_secs(
            idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        )))
        .build(config)
        .await
        .map_err(|e: PoolError| anyhow::anyhow!("Failed to create connection pool: {:?}", e))?;
    Ok(Arc::new(pool))
}

pub async fn get_connection(pool: &ArcDbPool) -> QueryResult<DbPoolConnection<'_>> {
    match pool.get().await {
        Ok(conn) => {
            GOT_CONNECTION_COUNT.inc();
            Ok(conn)
        },
        Err(e) => {
            UNABLE_TO_GET_CONNECTION_COUNT.inc();
            tracing::warn!("Error getting connection from pool: {:?}", e);
            Err(DieselError::DatabaseError(
                DatabaseErrorKind::UnableToSendCommand,
                Box::new(e.to_string()),
            ))
        },
    }
}

pub async fn execute_with_better_error<U>(pool: ArcDbPool, query: U) -> QueryResult<usize>
where
    U: QueryFragment<diesel::pg::Pg> + QueryId + Send,
{
    let debug_string = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();
    let db_insertion_duration_in_secs = std::time::Instant::now();

    tracing::debug!("Executing query: {:?}", debug_string);
    let conn = &mut get_connection(&pool).await?;
    let res = query.execute(conn).await;

    let table_name = INSERT_TABLE_NAME_RE
        .captures(debug_string.as_str())
        .and_then(|captures| captures.name("table_name"))
        .map(|m| m.as_str())
        .unwrap_or("unknown");
    tracing::info!(
        db_insertion_time = db_insertion_duration_in_secs.elapsed().as_secs_f64(),
        num_rows = res.as_ref().map(|n| *n as u64).unwrap_or_default(),
        table_name,
    );
    if let Err(ref e) = res {
        tracing::warn!("Error running query: {:?}\n{:?}", e, debug_string);
    }
    res
}

/// Runs the insert built from `item`. On failure the item is stripped of null bytes, which
/// postgres rejects in text and jsonb, and the insert is tried once more.
pub async fn insert_or_retry_cleaned<U, T>(
    pool: ArcDbPool,
    build_query: fn(T) -> U,
    item: T,
) -> QueryResult<usize>
where
    U: QueryFragment<diesel::pg::Pg> + QueryId + Send,
    T: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    let cleaned = remove_null_bytes(&item);
    match execute_with_better_error(pool.clone(), build_query(item)).await {
        Ok(rows) => Ok(rows),
        Err(e) => {
            tracing::warn!(error = ?e, "Insert failed, retrying with null bytes removed");
            execute_with_better_error(pool, build_query(cleaned)).await
        },
    }
}

pub fn run_pending_migrations<DB: Backend>(
    conn: &mut impl MigrationHarness<DB>,
) -> anyhow::Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("[Parser] Migrations failed: {}", e))?;
    Ok(())
}

// Migrations are blocking, so with the libpq feature we open a plain synchronous
// connection just for them.
#[cfg(feature = "libpq")]
pub async fn run_migrations(postgres_connection_string: String, _conn_pool: ArcDbPool) -> anyhow::Result<()> {
    use diesel::{Connection, PgConnection};

    tracing::info!("Running migrations");
    let migration_time = std::time::Instant::now();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = PgConnection::establish(&postgres_connection_string)
            .context("Failed to connect for migrations")?;
        run_pending_migrations(&mut conn)
    })
    .await
    .context("Migration task panicked")??;
    tracing::info!(
        duration_in_secs = migration_time.elapsed().as_secs_f64(),
        "[Parser] Finished migrations"
    );
    Ok(())
}

// Without libpq we go through the diesel-async connection wrapper instead.
#[cfg(not(feature = "libpq"))]
pub async fn run_migrations(_postgres_connection_string: String, conn_pool: ArcDbPool) -> anyhow::Result<()> {
    use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;

    tracing::info!("Running migrations");
    let migration_time = std::time::Instant::now();
    let conn = conn_pool
        // AsyncConnectionWrapper doesn't know how to work with a pooled connection.
        .dedicated_connection()
        .await
        .context("[Parser] Failed to get connection")?;
    tokio::task::spawn_blocking(move || {
        let mut conn: AsyncConnectionWrapper<diesel_async::AsyncPgConnection> =
            AsyncConnectionWrapper::from(conn);
        run_pending_migrations(&mut conn)
    })
    .await
    .context("Migration task panicked")??;
    tracing::info!(
        duration_in_secs = migration_time.elapsed().as_secs_f64(),
        "[Parser] Finished migrations"
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_and_clean_db_url_strips_sslrootcert() {
        let (url, cert) = parse_and_clean_db_url(
            "postgres://user:pw@localhost:5432/fundraising?sslmode=require&sslrootcert=/tmp/ca.pem",
        )
        .unwrap();
        assert_eq!(cert.as_deref(), Some("/tmp/ca.pem"));
        assert!(url.contains("sslmode=require"));
        assert!(!url.contains("sslrootcert"));
    }

    #[test]
    fn test_parse_and_clean_db_url_without_cert() {
        let (_url, cert) =
            parse_and_clean_db_url("postgres://user:pw@localhost:5432/fundraising").unwrap();
        assert!(cert.is_none());
    }

    #[test]
    fn test_parse_and_clean_db_url_invalid() {
        assert!(parse_and_clean_db_url("not a url").is_err());
    }

    #[test]
    fn test_insert_table_name_regex() {
        let captures = INSERT_TABLE_NAME_RE
            .captures(r#"INSERT INTO "fundraising_events" ("event_uid") VALUES ($1)"#)
            .unwrap();
        assert_eq!(&captures["table_name"], "fundraising_events");
    }
}
