// ABOUTME: Shared test helpers for link orchestration integration tests
// ABOUTME: Exports scripted gateway, SDK and launcher fakes plus orchestrator builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod fakes;

use std::sync::Arc;
use std::time::Duration;
use wearable_core::models::PollPolicy;
use wearable_link::host::StaticSession;
use wearable_link::oauth::OAuthLinkOrchestrator;
use wearable_link::registry::ProviderRegistry;
use wearable_link::store::ConnectionStateStore;

pub use fakes::{CheckAnswer, FakeGateway, FakeSdk, RecordingLauncher};

pub const USER_ID: &str = "user-123";

/// Ten checks three seconds apart, five seconds of slack
pub fn test_policy() -> PollPolicy {
    PollPolicy::new(10, Duration::from_secs(3), Duration::from_secs(5))
}

/// Orchestrator over the built-in registry with a signed-in session
pub fn oauth_orchestrator(
    gateway: &Arc<FakeGateway>,
    launcher: &Arc<RecordingLauncher>,
) -> (OAuthLinkOrchestrator, Arc<ConnectionStateStore>) {
    oauth_orchestrator_with_session(gateway, launcher, StaticSession::signed_in(USER_ID))
}

pub fn oauth_orchestrator_with_session(
    gateway: &Arc<FakeGateway>,
    launcher: &Arc<RecordingLauncher>,
    session: StaticSession,
) -> (OAuthLinkOrchestrator, Arc<ConnectionStateStore>) {
    let store = Arc::new(ConnectionStateStore::new());
    let orchestrator = OAuthLinkOrchestrator::new(
        gateway.clone(),
        Arc::clone(&store),
        Arc::new(ProviderRegistry::with_builtin_providers()),
        launcher.clone(),
        Arc::new(session),
        test_policy(),
    );
    (orchestrator, store)
}

/// Let spawned tasks run until `condition` holds
pub async fn yield_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
