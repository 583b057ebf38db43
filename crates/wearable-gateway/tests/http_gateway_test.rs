// ABOUTME: Integration tests for the HTTP health gateway against a mock backend
// ABOUTME: Covers auth URL short-circuit, connection lookup, data sync payloads and error classification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use wearable_core::errors::GatewayError;
use wearable_core::models::{CategoryOutcome, ProviderDescriptor, SyncCategory};
use wearable_gateway::circuit_breaker::CircuitBreakerConfig;
use wearable_gateway::{AuthorizationUrl, GatewayConfig, HealthGateway, HttpHealthGateway};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::oauth("oura", "Oura", "OURA"),
        ProviderDescriptor::oauth("garmin", "Garmin", "GARMIN"),
    ]
}

fn gateway_for(server: &MockServer) -> HttpHealthGateway {
    let config = GatewayConfig {
        bearer_token: Some("test-token".to_owned()),
        retry_timeout: Duration::from_millis(300),
        ..GatewayConfig::with_base_url(server.uri())
    };
    HttpHealthGateway::new(config, &providers())
}

#[tokio::test]
async fn test_auth_url_returns_url_with_data_source_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth-url"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "userId": "u1", "dataSource": "OURA" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorizationURL": "https://cloud.ouraring.com/oauth/authorize?state=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway_for(&server)
        .get_authorization_url("oura", "u1")
        .await
        .unwrap();
    assert_eq!(
        result,
        AuthorizationUrl::Url("https://cloud.ouraring.com/oauth/authorize?state=abc".to_owned())
    );
}

#[tokio::test]
async fn test_auth_url_already_connected_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth-url"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "isAlreadyConnected": true })),
        )
        .mount(&server)
        .await;

    let result = gateway_for(&server)
        .get_authorization_url("garmin", "u1")
        .await
        .unwrap();
    assert_eq!(result, AuthorizationUrl::AlreadyLinked);
}

#[tokio::test]
async fn test_auth_url_empty_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .get_authorization_url("oura", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_unknown_provider_never_hits_backend() {
    let server = MockServer::start().await;
    let err = gateway_for(&server)
        .get_authorization_url("strava", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownProvider(p) if p == "strava"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_check_connection_reads_data_source_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "OURA": { "connected": true, "lastSync": "2025-06-01T06:00:00Z" },
            "GARMIN": { "connected": false }
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    assert!(gateway.check_connection("u1", "oura").await.unwrap());
    assert!(!gateway.check_connection("u1", "garmin").await.unwrap());

    let oura = gateway.connection_status("u1", "oura").await.unwrap();
    assert!(oura.last_sync.is_some());
}

#[tokio::test]
async fn test_missing_connection_entry_means_not_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    assert!(!gateway_for(&server)
        .check_connection("u1", "oura")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_connection_statuses_use_one_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "GARMIN": { "connected": true, "syncEnabled": false }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["oura".to_owned(), "garmin".to_owned(), "polar".to_owned()];
    let mut statuses = gateway_for(&server)
        .connection_statuses("u1", &ids)
        .await
        .unwrap();

    let garmin = statuses.remove("garmin").unwrap().unwrap();
    assert!(garmin.connected);
    assert_eq!(garmin.sync_enabled, Some(false));
    assert!(!statuses.remove("oura").unwrap().unwrap().connected);
    assert!(matches!(
        statuses.remove("polar").unwrap(),
        Err(GatewayError::UnknownProvider(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_api_not_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .check_connection("u1", "oura")
        .await
        .unwrap_err();
    match err {
        GatewayError::Api {
            status_code,
            retryable,
            ..
        } => {
            assert_eq!(status_code, 503);
            assert!(retryable);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_transport() {
    let config = GatewayConfig::with_base_url("http://127.0.0.1:9");
    let gateway = HttpHealthGateway::new(config, &providers());
    let err = gateway.sync_provider_connections("u1").await.unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync-connections"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = GatewayConfig {
        circuit: CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        },
        ..GatewayConfig::with_base_url(server.uri())
    };
    let gateway = HttpHealthGateway::new(config, &providers());

    assert!(gateway.sync_provider_connections("u1").await.is_err());
    assert!(gateway.sync_provider_connections("u1").await.is_err());
    let err = gateway.sync_provider_connections("u1").await.unwrap_err();
    assert!(matches!(err, GatewayError::CircuitOpen { .. }));
}

#[tokio::test]
async fn test_data_sync_no_content_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(query_param("provider", "GARMIN"))
        .and(query_param("date", "2025-06-01"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let result = gateway_for(&server)
        .trigger_data_sync("u1", "garmin", date)
        .await
        .unwrap();
    assert_eq!(result.provider_id, "garmin");
    assert!(!result.any_success());
    assert!(!result.has_failures());
}

#[tokio::test]
async fn test_data_sync_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sleep": [{ "score": 82 }],
            "body": { "error": "upstream timeout" },
            "physical": []
        })))
        .mount(&server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let result = gateway_for(&server)
        .trigger_data_sync("u1", "oura", date)
        .await
        .unwrap();
    assert_eq!(result.failed_categories(), vec![SyncCategory::Body]);
    assert_eq!(
        result.outcomes[&SyncCategory::Physical],
        CategoryOutcome::NoData
    );
}

#[tokio::test]
async fn test_retry_failed_syncs_reports_backend_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync-retry"))
        .and(body_json(json!({ "userId": "u1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "retried": true })))
        .mount(&server)
        .await;

    assert!(gateway_for(&server).retry_failed_syncs("u1").await.unwrap());
}

#[tokio::test]
async fn test_retry_failed_syncs_is_time_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync-retry"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "retried": true }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let retried = gateway_for(&server).retry_failed_syncs("u1").await.unwrap();
    assert!(!retried);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_disconnect_deletes_data_source() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/connections/OURA"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway_for(&server).disconnect("u1", "oura").await.unwrap();
}
