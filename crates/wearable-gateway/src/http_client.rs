// ABOUTME: reqwest client construction with configured timeouts
// ABOUTME: One pooled client per gateway, built from the gateway configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::warn;
use wearable_core::constants::gateway;

/// Timeouts applied to every backend request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Whole-request timeout
    pub request: Duration,
    /// TCP connect timeout
    pub connect: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(gateway::DEFAULT_TIMEOUT_SECS),
            connect: Duration::from_secs(gateway::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Build a pooled HTTP client with the given timeouts
///
/// Falls back to reqwest defaults if the builder rejects the configuration
/// (for example when the TLS backend cannot initialize).
#[must_use]
pub fn build_client(timeouts: HttpTimeouts) -> Client {
    ClientBuilder::new()
        .timeout(timeouts.request)
        .connect_timeout(timeouts.connect)
        .user_agent(concat!("wearable-link/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client, using defaults");
            Client::new()
        })
}
