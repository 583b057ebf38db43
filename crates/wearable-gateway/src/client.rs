// ABOUTME: reqwest implementation of the HealthGateway contract
// ABOUTME: Maps provider ids to backend data sources and classifies transport versus API failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use wearable_core::constants::gateway;
use wearable_core::errors::GatewayError;
use wearable_core::models::{ProviderDescriptor, SyncResult};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::http_client::{build_client, HttpTimeouts};
use crate::wire::{
    sync_result_from_payload, AuthUrlRequest, AuthUrlResponse, ConnectionsResponse,
    SyncRetryResponse, UserRequest,
};
use crate::{AuthorizationUrl, ConnectionStatuses, HealthGateway, RemoteConnection};

/// Backend location, credentials and time budgets
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL the endpoint paths are appended to
    pub base_url: String,
    /// Optional bearer token for the backend
    pub bearer_token: Option<String>,
    /// Per-request timeouts
    pub timeouts: HttpTimeouts,
    /// Upper bound on `retry_failed_syncs`
    pub retry_timeout: Duration,
    /// Circuit breaker thresholds
    pub circuit: CircuitBreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: gateway::DEFAULT_BASE_URL.to_owned(),
            bearer_token: None,
            timeouts: HttpTimeouts::default(),
            retry_timeout: Duration::from_secs(gateway::DEFAULT_RETRY_TIMEOUT_SECS),
            circuit: CircuitBreakerConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Config pointing at `base_url` with default budgets
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// HTTP client for the wearable backend
pub struct HttpHealthGateway {
    config: GatewayConfig,
    client: Client,
    data_sources: HashMap<String, String>,
    breaker: CircuitBreaker,
}

impl HttpHealthGateway {
    /// Create a gateway that knows the given providers
    pub fn new<'a>(
        config: GatewayConfig,
        providers: impl IntoIterator<Item = &'a ProviderDescriptor>,
    ) -> Self {
        let data_sources = providers
            .into_iter()
            .map(|p| (p.id.clone(), p.data_source_key.clone()))
            .collect();
        let client = build_client(config.timeouts);
        let breaker = CircuitBreaker::new("health-gateway", config.circuit);
        Self {
            config,
            client,
            data_sources,
            breaker,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn data_source(&self, provider_id: &str) -> Result<&str, GatewayError> {
        self.data_sources
            .get(provider_id)
            .map(String::as_str)
            .ok_or_else(|| GatewayError::UnknownProvider(provider_id.to_owned()))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request under circuit protection, mapping non-2xx to `Api`
    async fn execute(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let timeout_secs = self.config.timeouts.request.as_secs();
        let request = self.authorized(request);
        self.breaker
            .call(async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_timeout() {
                        GatewayError::Timeout {
                            endpoint,
                            timeout_secs,
                        }
                    } else {
                        GatewayError::Transport(e.to_string())
                    }
                })?;

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let message = response.text().await.unwrap_or_default();
                Err(GatewayError::Api {
                    endpoint,
                    status_code: status.as_u16(),
                    message,
                    retryable: status.is_server_error()
                        || status == StatusCode::TOO_MANY_REQUESTS,
                })
            })
            .await
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        field: &'static str,
    ) -> Result<T, GatewayError> {
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|source| GatewayError::Parse { field, source })
    }

    async fn list_connections(&self, user_id: &str) -> Result<ConnectionsResponse, GatewayError> {
        let request = self
            .client
            .get(self.url(gateway::CONNECTIONS_PATH))
            .query(&[("userId", user_id)]);
        let response = self.execute("connections", request).await?;
        Self::decode(response, "connections_response").await
    }

    /// Take a provider's entry out of a listing; absent means not connected
    fn take_connection(
        &self,
        connections: &mut ConnectionsResponse,
        provider_id: &str,
    ) -> Result<RemoteConnection, GatewayError> {
        let data_source = self.data_source(provider_id)?;
        let entry = connections
            .remove(data_source)
            .or_else(|| connections.remove(provider_id));
        Ok(entry.map(RemoteConnection::from).unwrap_or_default())
    }
}

#[async_trait]
impl HealthGateway for HttpHealthGateway {
    async fn get_authorization_url(
        &self,
        provider_id: &str,
        user_id: &str,
    ) -> Result<AuthorizationUrl, GatewayError> {
        let data_source = self.data_source(provider_id)?;
        let request = self
            .client
            .post(self.url(gateway::AUTH_URL_PATH))
            .json(&AuthUrlRequest {
                user_id,
                data_source,
            });
        let response = self.execute("auth_url", request).await?;
        let body: AuthUrlResponse = Self::decode(response, "auth_url_response").await?;

        if body.is_already_connected {
            debug!(provider = %provider_id, "Backend reports provider already connected");
            return Ok(AuthorizationUrl::AlreadyLinked);
        }
        body.authorization_url
            .filter(|url| !url.is_empty())
            .map(AuthorizationUrl::Url)
            .ok_or_else(|| GatewayError::MalformedResponse {
                endpoint: "auth_url",
                reason: "neither authorizationURL nor isAlreadyConnected present".to_owned(),
            })
    }

    async fn check_connection(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self.connection_status(user_id, provider_id).await?.connected)
    }

    async fn connection_status(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<RemoteConnection, GatewayError> {
        self.data_source(provider_id)?;
        let mut connections = self.list_connections(user_id).await?;
        self.take_connection(&mut connections, provider_id)
    }

    async fn connection_statuses(
        &self,
        user_id: &str,
        provider_ids: &[String],
    ) -> Result<ConnectionStatuses, GatewayError> {
        let mut connections = self.list_connections(user_id).await?;
        let statuses = provider_ids
            .iter()
            .map(|provider_id| {
                let remote = self.take_connection(&mut connections, provider_id);
                (provider_id.clone(), remote)
            })
            .collect();
        Ok(statuses)
    }

    async fn sync_provider_connections(&self, user_id: &str) -> Result<(), GatewayError> {
        let request = self
            .client
            .post(self.url(gateway::SYNC_CONNECTIONS_PATH))
            .json(&UserRequest { user_id });
        self.execute("sync_connections", request).await?;
        Ok(())
    }

    async fn trigger_data_sync(
        &self,
        user_id: &str,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<SyncResult, GatewayError> {
        let data_source = self.data_source(provider_id)?;
        let date_param = date.format("%Y-%m-%d").to_string();
        let request = self.client.get(self.url(gateway::DATA_PATH)).query(&[
            ("userId", user_id),
            ("provider", data_source),
            ("date", date_param.as_str()),
        ]);
        let response = self.execute("data", request).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(SyncResult::no_data(provider_id, date));
        }
        let payload: serde_json::Value = Self::decode(response, "data_payload").await?;
        Ok(sync_result_from_payload(provider_id, date, &payload))
    }

    async fn retry_failed_syncs(&self, user_id: &str) -> Result<bool, GatewayError> {
        let request = self
            .client
            .post(self.url(gateway::SYNC_RETRY_PATH))
            .json(&UserRequest { user_id });

        let attempt = async {
            let response = self.execute("sync_retry", request).await?;
            let body: SyncRetryResponse = Self::decode(response, "sync_retry_response").await?;
            Ok::<_, GatewayError>(body.retried)
        };

        if let Ok(result) = tokio::time::timeout(self.config.retry_timeout, attempt).await {
            result
        } else {
            warn!(
                user.id = %user_id,
                timeout_secs = self.config.retry_timeout.as_secs(),
                "Failed-sync retry exceeded its time budget"
            );
            Ok(false)
        }
    }

    async fn disconnect(&self, user_id: &str, provider_id: &str) -> Result<(), GatewayError> {
        let data_source = self.data_source(provider_id)?;
        let path = format!("{}/{data_source}", gateway::CONNECTIONS_PATH);
        let request = self
            .client
            .delete(self.url(&path))
            .query(&[("userId", user_id)]);
        self.execute("disconnect", request).await?;
        Ok(())
    }
}
