// ABOUTME: JSON payloads exchanged with the wearable backend
// ABOUTME: camelCase request bodies and tolerant response decoding for connection and data endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use wearable_core::models::{CategoryOutcome, SyncCategory, SyncResult};

use crate::RemoteConnection;

/// `POST /auth-url` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlRequest<'a> {
    pub user_id: &'a str,
    pub data_source: &'a str,
}

/// `POST /auth-url` response: either a URL or an already-connected marker
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    #[serde(rename = "authorizationURL", alias = "authorizationUrl")]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub is_already_connected: bool,
}

/// Body carrying only the user id (`/sync-connections`, `/sync-retry`)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest<'a> {
    pub user_id: &'a str,
}

/// `POST /sync-retry` response
#[derive(Debug, Deserialize)]
pub struct SyncRetryResponse {
    #[serde(default)]
    pub retried: bool,
}

/// One entry of `GET /connections`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    #[serde(default)]
    pub connected: bool,
    pub last_sync: Option<String>,
    pub sync_enabled: Option<bool>,
}

impl From<ConnectionEntry> for RemoteConnection {
    fn from(entry: ConnectionEntry) -> Self {
        Self {
            connected: entry.connected,
            last_sync: entry.last_sync.as_deref().and_then(parse_timestamp),
            sync_enabled: entry.sync_enabled,
        }
    }
}

/// `GET /connections` response keyed by data source (or provider id)
pub type ConnectionsResponse = HashMap<String, ConnectionEntry>;

/// Parse a backend timestamp (RFC 3339, or a bare date)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

/// Map one category value of a `GET /data` payload to an outcome
///
/// Accepts an explicit outcome string, `null` / empty collections (no data),
/// an object carrying `error` (failed), or any other payload (data present).
fn category_outcome(value: &Value) -> CategoryOutcome {
    match value {
        Value::Null => CategoryOutcome::NoData,
        Value::String(s) => match s.to_ascii_uppercase().as_str() {
            "ERROR" | "FAILED" => CategoryOutcome::Error,
            "NO_DATA" | "" => CategoryOutcome::NoData,
            _ => CategoryOutcome::Success,
        },
        Value::Array(items) if items.is_empty() => CategoryOutcome::NoData,
        Value::Object(map) if map.is_empty() => CategoryOutcome::NoData,
        Value::Object(map) if map.contains_key("error") => CategoryOutcome::Error,
        Value::Object(map) => map
            .get("status")
            .map_or(CategoryOutcome::Success, category_outcome),
        _ => CategoryOutcome::Success,
    }
}

/// Build a `SyncResult` from a `GET /data` payload
#[must_use]
pub fn sync_result_from_payload(provider_id: &str, date: NaiveDate, payload: &Value) -> SyncResult {
    let mut result = SyncResult::new(provider_id, date);
    for category in SyncCategory::ALL {
        if let Some(value) = payload.get(category.as_str()) {
            result
                .outcomes
                .insert(category, category_outcome(value));
        }
    }
    result
}
