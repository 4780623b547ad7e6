// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{ACTIVITY_LIMIT, DONATIONS_LIMIT, EVENTS_LIMIT, LEADERBOARD_LIMIT};
use crate::{ingestion::IngestionService, utils::counters::API_REQUEST_COUNT};
use serde::Serialize;
use serde_json::{json, Value};
use std::{collections::HashMap, convert::Infallible, sync::Arc};
use tracing::{error, warn};
use warp::{http::StatusCode, hyper::body::Bytes, reply::Response, Reply};

type HandlerResult = Result<Response, Infallible>;

fn respond<T: Serialize>(endpoint: &str, status: StatusCode, body: &T) -> Response {
    API_REQUEST_COUNT
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn database_error(endpoint: &str, e: anyhow::Error) -> Response {
    error!(endpoint, error = ?e, "[Api] Read query failed");
    respond(endpoint, StatusCode::INTERNAL_SERVER_ERROR, &json!({"error": "Database error"}))
}

fn parse_campaign_id(endpoint: &str, raw: &str) -> Result<i64, Response> {
    raw.parse::<i64>().map_err(|_| {
        respond(endpoint, StatusCode::BAD_REQUEST, &json!({"error": "Invalid campaign ID"}))
    })
}

/// Wraps a successful list or object under `key`, or maps the storage error to a 500.
fn keyed<T: Serialize>(endpoint: &str, key: &str, result: anyhow::Result<T>) -> Response {
    match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(value) => {
            let mut body = serde_json::Map::new();
            body.insert(key.to_string(), value);
            respond(endpoint, StatusCode::OK, &Value::Object(body))
        },
        Err(e) => database_error(endpoint, e),
    }
}

pub async fn chainhook(
    authorization: Option<String>,
    body: Bytes,
    service: Arc<IngestionService>,
) -> HandlerResult {
    const ENDPOINT: &str = "chainhook";
    if !service.authorize(authorization.as_deref()) {
        return Ok(respond(
            ENDPOINT,
            StatusCode::UNAUTHORIZED,
            &json!({"ok": false, "error": "unauthorized"}),
        ));
    }
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "[Chainhook] Rejected delivery with an invalid JSON body");
            return Ok(respond(
                ENDPOINT,
                StatusCode::BAD_REQUEST,
                &json!({"ok": false, "error": "invalid JSON body"}),
            ));
        },
    };
    Ok(match service.ingest(&payload).await {
        Ok(summary) => respond(ENDPOINT, StatusCode::OK, &summary),
        Err(_) => respond(ENDPOINT, StatusCode::INTERNAL_SERVER_ERROR, &json!({"ok": false})),
    })
}

pub async fn health(service: Arc<IngestionService>) -> HandlerResult {
    const ENDPOINT: &str = "health";
    Ok(match service.store().health_check().await {
        Ok(()) => respond(ENDPOINT, StatusCode::OK, &json!({"ok": true})),
        Err(e) => {
            error!(error = ?e, "[Api] Health check failed");
            respond(ENDPOINT, StatusCode::INTERNAL_SERVER_ERROR, &json!({"ok": false}))
        },
    })
}

pub async fn campaigns(service: Arc<IngestionService>) -> HandlerResult {
    Ok(keyed(
        "campaigns",
        "campaigns",
        service.store().campaign_summaries().await,
    ))
}

pub async fn campaign(raw_id: String, service: Arc<IngestionService>) -> HandlerResult {
    const ENDPOINT: &str = "campaign";
    let campaign_id = match parse_campaign_id(ENDPOINT, &raw_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    Ok(match service.store().campaign_summary(campaign_id).await {
        Ok(Some(summary)) => respond(ENDPOINT, StatusCode::OK, &json!({"campaign": summary})),
        Ok(None) => respond(
            ENDPOINT,
            StatusCode::NOT_FOUND,
            &json!({"error": "Campaign not found"}),
        ),
        Err(e) => database_error(ENDPOINT, e),
    })
}

pub async fn campaign_events(
    raw_id: String,
    query: HashMap<String, String>,
    service: Arc<IngestionService>,
) -> HandlerResult {
    const ENDPOINT: &str = "campaign_events";
    let campaign_id = match parse_campaign_id(ENDPOINT, &raw_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let limit = EVENTS_LIMIT.resolve(&query);
    Ok(keyed(
        ENDPOINT,
        "events",
        service.store().campaign_events(campaign_id, limit).await,
    ))
}

pub async fn leaderboard(
    raw_id: String,
    query: HashMap<String, String>,
    service: Arc<IngestionService>,
) -> HandlerResult {
    const ENDPOINT: &str = "leaderboard";
    let campaign_id = match parse_campaign_id(ENDPOINT, &raw_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let limit = LEADERBOARD_LIMIT.resolve(&query);
    Ok(keyed(
        ENDPOINT,
        "leaderboard",
        service.store().leaderboard(campaign_id, limit).await,
    ))
}

pub async fn activity(
    query: HashMap<String, String>,
    service: Arc<IngestionService>,
) -> HandlerResult {
    let limit = ACTIVITY_LIMIT.resolve(&query);
    Ok(keyed(
        "activity",
        "activity",
        service.store().activity(limit).await,
    ))
}

pub async fn donor_donations(
    principal: String,
    query: HashMap<String, String>,
    service: Arc<IngestionService>,
) -> HandlerResult {
    let limit = DONATIONS_LIMIT.resolve(&query);
    Ok(keyed(
        "donor_donations",
        "donations",
        service.store().donor_donations(&principal, limit).await,
    ))
}

pub async fn stats(service: Arc<IngestionService>) -> HandlerResult {
    Ok(keyed("stats", "stats", service.store().platform_stats().await))
}

pub async fn owner_campaigns(principal: String, service: Arc<IngestionService>) -> HandlerResult {
    Ok(keyed(
        "owner_campaigns",
        "campaigns",
        service.store().owner_campaigns(&principal).await,
    ))
}
