// ABOUTME: Integration tests for the connection state store
// ABOUTME: Covers pending-request supersession, bulk replacement, cancellation and change notification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod helpers;

use chrono::{TimeZone, Utc};
use helpers::test_policy;
use std::collections::HashMap;
use wearable_core::errors::LinkErrorKind;
use wearable_core::models::{ConnectionRecord, ConnectionStatus, RecordedError};
use wearable_link::store::{ConnectionStateStore, PendingPhase};

fn timed_out() -> RecordedError {
    RecordedError::new(LinkErrorKind::LinkTimedOut, "not confirmed after 10 attempts")
}

#[test]
fn test_unknown_provider_reads_not_connected() {
    let store = ConnectionStateStore::new();
    assert_eq!(store.get("garmin"), ConnectionRecord::not_connected());
    assert!(store.snapshot().is_empty());
    assert!(store.pending_providers().is_empty());
}

#[test]
fn test_begin_pending_writes_linking_or_polling() {
    let store = ConnectionStateStore::new();
    store.begin_pending("garmin", "u1", test_policy(), PendingPhase::FetchingUrl);
    store.begin_pending("oura", "u1", test_policy(), PendingPhase::Polling);

    assert_eq!(store.get("garmin").status, ConnectionStatus::Linking);
    assert_eq!(store.get("oura").status, ConnectionStatus::Polling);
    assert_eq!(store.pending_providers(), vec!["garmin", "oura"]);
    assert!(store
        .pending("oura")
        .is_some_and(|request| request.polling_started_at().is_some()));
}

#[test]
fn test_newer_request_supersedes_older() {
    let store = ConnectionStateStore::new();
    let first = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::FetchingUrl);
    let second = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::FetchingUrl);

    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert_ne!(first.id(), second.id());

    assert!(!store.advance_pending(
        &first,
        PendingPhase::FetchingUrl,
        PendingPhase::AwaitingExternalAuth,
        ConnectionStatus::AwaitingExternalAuth,
    ));
    assert!(!store.complete_pending(&first, ConnectionStatus::Failed, Some(timed_out())));
    assert_eq!(store.get("garmin").status, ConnectionStatus::Linking);

    assert!(store.complete_pending(&second, ConnectionStatus::Linked, None));
    assert_eq!(store.get("garmin").status, ConnectionStatus::Linked);
    assert!(store.pending("garmin").is_none());
}

#[test]
fn test_advance_is_single_flight() {
    let store = ConnectionStateStore::new();
    let request = store.begin_pending(
        "oura",
        "u1",
        test_policy(),
        PendingPhase::AwaitingExternalAuth,
    );
    let advance = || {
        store.advance_pending(
            &request,
            PendingPhase::AwaitingExternalAuth,
            PendingPhase::Polling,
            ConnectionStatus::Polling,
        )
    };

    assert!(advance());
    assert!(!advance());
    assert_eq!(request.phase(), PendingPhase::Polling);
    assert_eq!(store.get("oura").status, ConnectionStatus::Polling);
}

#[test]
fn test_direct_write_supersedes_pending_request() {
    let store = ConnectionStateStore::new();
    let request = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);

    store.set("garmin", ConnectionStatus::NotConnected, None);

    assert!(request.is_cancelled());
    assert!(store.pending("garmin").is_none());
    assert!(!store.complete_pending(&request, ConnectionStatus::Linked, None));
    assert_eq!(store.get("garmin").status, ConnectionStatus::NotConnected);
}

#[test]
fn test_cancel_pending_is_noop_without_request() {
    let store = ConnectionStateStore::new();
    store.set_record("garmin", ConnectionRecord::failed(timed_out()));

    assert!(!store.cancel_pending("garmin"));
    assert!(store.get("garmin").failed_with(LinkErrorKind::LinkTimedOut));

    let request = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);
    assert!(store.cancel_pending("garmin"));
    assert!(request.is_cancelled());
    assert_eq!(store.get("garmin"), ConnectionRecord::not_connected());
}

#[test]
fn test_cancel_all_pending_resets_only_in_flight_providers() {
    let store = ConnectionStateStore::new();
    store.set_record("polar", ConnectionRecord::linked(None));
    let garmin = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);
    let oura = store.begin_pending("oura", "u1", test_policy(), PendingPhase::FetchingUrl);

    assert_eq!(store.cancel_all_pending(), 2);
    assert!(garmin.is_cancelled() && oura.is_cancelled());
    assert_eq!(store.get("garmin").status, ConnectionStatus::NotConnected);
    assert_eq!(store.get("oura").status, ConnectionStatus::NotConnected);
    assert_eq!(store.get("polar").status, ConnectionStatus::Linked);
}

#[test]
fn test_bulk_replace_keeps_in_flight_record_for_pending_provider() {
    let store = ConnectionStateStore::new();
    store.set_record("polar", ConnectionRecord::linked(None));
    let request = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);

    let mut replacement = HashMap::new();
    replacement.insert("garmin".to_owned(), ConnectionRecord::not_connected());
    replacement.insert("oura".to_owned(), ConnectionRecord::linked(None));
    store.bulk_replace(replacement);

    assert_eq!(store.get("garmin").status, ConnectionStatus::Polling);
    assert!(!request.is_cancelled());
    assert_eq!(store.get("oura").status, ConnectionStatus::Linked);
    assert_eq!(store.get("polar"), ConnectionRecord::not_connected());
    assert!(!store.snapshot().contains_key("polar"));
}

#[test]
fn test_bulk_replace_closes_pending_request_when_connected() {
    let store = ConnectionStateStore::new();
    let request = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);

    let mut replacement = HashMap::new();
    replacement.insert("garmin".to_owned(), ConnectionRecord::linked(None));
    store.bulk_replace(replacement);

    assert!(request.is_cancelled());
    assert!(store.pending("garmin").is_none());
    assert_eq!(store.get("garmin").status, ConnectionStatus::Linked);
    assert!(!store.complete_pending(&request, ConnectionStatus::Failed, Some(timed_out())));
}

#[test]
fn test_bulk_replace_keeps_sdk_link_in_progress() {
    let store = ConnectionStateStore::new();
    store.set("apple_health", ConnectionStatus::Linking, None);
    store.set("health_connect", ConnectionStatus::Linking, None);

    let mut replacement = HashMap::new();
    replacement.insert("apple_health".to_owned(), ConnectionRecord::not_connected());
    replacement.insert("health_connect".to_owned(), ConnectionRecord::linked(None));
    store.bulk_replace(replacement);

    assert_eq!(store.get("apple_health").status, ConnectionStatus::Linking);
    assert_eq!(store.get("health_connect").status, ConnectionStatus::Linked);
    assert!(store.pending_providers().is_empty());
}

#[test]
fn test_mark_synced_only_touches_existing_records() {
    let store = ConnectionStateStore::new();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
    store.set_record("oura", ConnectionRecord::linked(None));

    store.mark_synced("oura", at);
    store.mark_synced("garmin", at);

    assert_eq!(store.get("oura").last_synced_at, Some(at));
    assert!(!store.snapshot().contains_key("garmin"));
}

#[test]
fn test_set_keeps_last_sync_time() {
    let store = ConnectionStateStore::new();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
    store.set_record("oura", ConnectionRecord::linked(Some(at)));

    store.set("oura", ConnectionStatus::Failed, Some(timed_out()));

    let record = store.get("oura");
    assert!(record.failed_with(LinkErrorKind::LinkTimedOut));
    assert_eq!(record.last_synced_at, Some(at));
}

#[test]
fn test_with_records_drops_in_flight_statuses() {
    let mut cached = HashMap::new();
    cached.insert("garmin".to_owned(), ConnectionRecord::with_status(ConnectionStatus::Polling));
    cached.insert(
        "oura".to_owned(),
        ConnectionRecord::with_status(ConnectionStatus::AwaitingExternalAuth),
    );
    cached.insert("polar".to_owned(), ConnectionRecord::linked(None));

    let store = ConnectionStateStore::with_records(cached);

    assert_eq!(store.get("garmin"), ConnectionRecord::not_connected());
    assert_eq!(store.get("oura"), ConnectionRecord::not_connected());
    assert_eq!(store.get("polar").status, ConnectionStatus::Linked);
    assert!(store.pending_providers().is_empty());
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let store = ConnectionStateStore::new();
    let mut updates = store.subscribe();
    assert!(!updates.has_changed().unwrap());

    store.begin_pending("garmin", "u1", test_policy(), PendingPhase::FetchingUrl);
    updates.changed().await.unwrap();
    assert_eq!(
        updates.borrow_and_update().get("garmin").map(|r| r.status),
        Some(ConnectionStatus::Linking)
    );

    store.cancel_pending("garmin");
    updates.changed().await.unwrap();
    assert_eq!(
        updates.borrow_and_update().get("garmin").map(|r| r.status),
        Some(ConnectionStatus::NotConnected)
    );
}

#[test]
fn test_reset_clears_records_and_requests() {
    let store = ConnectionStateStore::new();
    store.set_record("polar", ConnectionRecord::linked(None));
    let request = store.begin_pending("garmin", "u1", test_policy(), PendingPhase::Polling);

    store.reset();

    assert!(request.is_cancelled());
    assert!(store.snapshot().is_empty());
    assert!(store.pending_providers().is_empty());
}
