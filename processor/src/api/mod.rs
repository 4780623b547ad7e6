// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface: the chainhook receiver, the liveness probe and the read API.

pub mod handlers;

use crate::ingestion::IngestionService;
use futures::{pin_mut, Stream, StreamExt};
use std::{collections::HashMap, convert::Infallible, sync::Arc};
use warp::{
    http::StatusCode,
    hyper::body::Bytes,
    reject::{MethodNotAllowed, Reject},
    Buf, Filter, Rejection, Reply,
};

/// Largest chainhook body accepted, in bytes.
pub const MAX_CHAINHOOK_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Default and maximum page size for a list endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageLimit {
    pub default: i64,
    pub max: i64,
}

pub const EVENTS_LIMIT: PageLimit = PageLimit { default: 50, max: 100 };
pub const LEADERBOARD_LIMIT: PageLimit = PageLimit { default: 20, max: 50 };
pub const ACTIVITY_LIMIT: PageLimit = PageLimit { default: 20, max: 100 };
pub const DONATIONS_LIMIT: PageLimit = PageLimit { default: 50, max: 100 };

impl PageLimit {
    /// Missing, unparsable or non-positive values fall back to the default.
    pub fn resolve(&self, query: &HashMap<String, String>) -> i64 {
        query
            .get("limit")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default)
            .min(self.max)
    }
}

fn with_service(
    service: Arc<IngestionService>,
) -> impl Filter<Extract = (Arc<IngestionService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

#[derive(Debug)]
struct BodyTooLarge;

impl Reject for BodyTooLarge {}

#[derive(Debug)]
struct BodyReadFailed;

impl Reject for BodyReadFailed {}

/// Buffers the request body up to `max_bytes`. A declared `Content-Length` over the cap is
/// refused before reading; chunked bodies are cut off once they pass it.
fn limited_body(max_bytes: u64) -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, stream| async move {
            if declared.is_some_and(|len| len > max_bytes) {
                return Err(warp::reject::custom(BodyTooLarge));
            }
            read_limited(stream, max_bytes).await
        })
}

async fn read_limited<S, B>(stream: S, max_bytes: u64) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    pin_mut!(stream);
    let mut body: Vec<u8> = vec![];
    while let Some(chunk) = stream.next().await {
        let mut chunk = chunk.map_err(|e| {
            tracing::warn!(error = %e, "[Api] Failed to read request body");
            warp::reject::custom(BodyReadFailed)
        })?;
        if (body.len() + chunk.remaining()) as u64 > max_bytes {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            let n = bytes.len();
            body.extend_from_slice(bytes);
            chunk.advance(n);
        }
    }
    Ok(Bytes::from(body))
}

fn limit_query() -> impl Filter<Extract = (HashMap<String, String>,), Error = Infallible> + Clone {
    warp::query::<HashMap<String, String>>()
        .or(warp::any().map(HashMap::new))
        .unify()
}

/// Every route plus CORS and JSON rejection handling. Error replies go through CORS too so
/// browsers can read them; only a refused preflight is answered without CORS headers.
pub fn routes(
    service: Arc<IngestionService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let chainhook = warp::path("chainhook")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(limited_body(MAX_CHAINHOOK_BODY_BYTES))
        .and(with_service(service.clone()))
        .and_then(handlers::chainhook);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handlers::health);

    let campaigns = warp::path!("api" / "campaigns")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handlers::campaigns);

    let campaign = warp::path!("api" / "campaigns" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handlers::campaign);

    let campaign_events = warp::path!("api" / "campaigns" / String / "events")
        .and(warp::get())
        .and(limit_query())
        .and(with_service(service.clone()))
        .and_then(handlers::campaign_events);

    let leaderboard = warp::path!("api" / "campaigns" / String / "leaderboard")
        .and(warp::get())
        .and(limit_query())
        .and(with_service(service.clone()))
        .and_then(handlers::leaderboard);

    let activity = warp::path!("api" / "activity")
        .and(warp::get())
        .and(limit_query())
        .and(with_service(service.clone()))
        .and_then(handlers::activity);

    let donor_donations = warp::path!("api" / "donors" / String / "donations")
        .and(warp::get())
        .and(limit_query())
        .and(with_service(service.clone()))
        .and_then(handlers::donor_donations);

    let stats = warp::path!("api" / "stats")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handlers::stats);

    let owner_campaigns = warp::path!("api" / "owner" / String / "campaigns")
        .and(warp::get())
        .and(with_service(service))
        .and_then(handlers::owner_campaigns);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    chainhook
        .or(health)
        .or(campaigns)
        .or(campaign)
        .or(campaign_events)
        .or(leaderboard)
        .or(activity)
        .or(donor_donations)
        .or(stats)
        .or(owner_campaigns)
        .recover(handle_rejection)
        .with(cors)
        .recover(handle_rejection)
}

async fn handle_rejection(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, error) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if rejection.find::<BodyTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
    } else if rejection.find::<warp::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "cors forbidden")
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else {
        tracing::warn!(rejection = ?rejection, "[Api] Unhandled rejection");
        (StatusCode::BAD_REQUEST, "bad request")
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({"ok": false, "error": error})),
        status,
    )
    .into_response())
}
