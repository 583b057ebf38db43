// ABOUTME: Remote health gateway: the only component that talks to the backend
// ABOUTME: Defines the HealthGateway contract and its reqwest-based implementation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Wearable Gateway
//!
//! Pure request/response access to the wearable backend. The backend brokers
//! every provider: it hands out authorization URLs, knows which providers a
//! user has connected, and pulls per-day data from the aggregation service.
//!
//! Nothing here keeps connection state. The orchestrator decides what a
//! response means for the local view.

/// Circuit breaker guarding backend calls
pub mod circuit_breaker;

/// `HealthGateway` implementation over reqwest
pub mod client;

/// HTTP client construction
pub mod http_client;

/// Request and response payloads
pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use wearable_core::errors::GatewayError;
use wearable_core::models::SyncResult;

pub use client::{GatewayConfig, HttpHealthGateway};

/// Answer to an authorization URL request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationUrl {
    /// Open this URL in an external agent
    Url(String),
    /// Provider is already connected; no authorization needed
    AlreadyLinked,
}

/// Backend view of one provider connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteConnection {
    /// Whether the backend considers the provider connected
    pub connected: bool,
    /// Last data sync the backend knows about
    pub last_sync: Option<DateTime<Utc>>,
    /// `Some(false)` when connected but data sync is switched off
    pub sync_enabled: Option<bool>,
}

/// Per-provider answers of one connection listing
pub type ConnectionStatuses = HashMap<String, Result<RemoteConnection, GatewayError>>;

/// Request/response contract with the remote health backend
///
/// Every method surfaces network failures as transport-class `GatewayError`s
/// (`GatewayError::is_transport`) so callers can tell "the provider said no"
/// from "we could not ask".
#[async_trait]
pub trait HealthGateway: Send + Sync {
    /// Request an authorization URL for an OAuth provider
    async fn get_authorization_url(
        &self,
        provider_id: &str,
        user_id: &str,
    ) -> Result<AuthorizationUrl, GatewayError>;

    /// Whether the backend sees the provider as connected for the user
    async fn check_connection(&self, user_id: &str, provider_id: &str)
        -> Result<bool, GatewayError>;

    /// Full backend view of one connection
    ///
    /// Backends that only answer yes/no get a record without sync details.
    async fn connection_status(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<RemoteConnection, GatewayError> {
        let connected = self.check_connection(user_id, provider_id).await?;
        Ok(RemoteConnection {
            connected,
            ..RemoteConnection::default()
        })
    }

    /// Backend view of several providers taken in one read
    ///
    /// An outer error means the listing itself failed and no provider was
    /// answered. The default asks `connection_status` once per provider.
    async fn connection_statuses(
        &self,
        user_id: &str,
        provider_ids: &[String],
    ) -> Result<ConnectionStatuses, GatewayError> {
        let checks = provider_ids.iter().map(|provider_id| async move {
            let remote = self.connection_status(user_id, provider_id).await;
            (provider_id.clone(), remote)
        });
        Ok(join_all(checks).await.into_iter().collect())
    }

    /// Ask the backend to refresh its connection table from the aggregation service
    async fn sync_provider_connections(&self, user_id: &str) -> Result<(), GatewayError>;

    /// Pull one day of provider data
    async fn trigger_data_sync(
        &self,
        user_id: &str,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<SyncResult, GatewayError>;

    /// Re-attempt previously failed category syncs; best effort and time-bounded
    async fn retry_failed_syncs(&self, user_id: &str) -> Result<bool, GatewayError>;

    /// Remove the provider connection on the backend
    async fn disconnect(&self, user_id: &str, provider_id: &str) -> Result<(), GatewayError>;
}
