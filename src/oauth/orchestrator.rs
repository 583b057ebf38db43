// ABOUTME: OAuth link orchestration: authorization URL, external launch, foreground-triggered polling
// ABOUTME: Enforces one pending request per provider and single-flight poll loops
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;
use wearable_core::errors::{GatewayError, LinkError, LinkResult};
use wearable_core::models::{
    ConnectionStatus, LinkOutcome, PollPolicy, ProviderDescriptor, RecordedError,
};
use wearable_gateway::{AuthorizationUrl, HealthGateway};

use super::poll::{PollLoop, PollOutcome};
use crate::host::{ExternalAgentLauncher, SessionProvider};
use crate::logging::LinkLogger;
use crate::registry::ProviderRegistry;
use crate::store::{ConnectionStateStore, PendingLinkRequest, PendingPhase};

/// Drives OAuth provider links for the signed-in user
#[derive(Clone)]
pub struct OAuthLinkOrchestrator {
    gateway: Arc<dyn HealthGateway>,
    store: Arc<ConnectionStateStore>,
    registry: Arc<ProviderRegistry>,
    launcher: Arc<dyn ExternalAgentLauncher>,
    session: Arc<dyn SessionProvider>,
    default_policy: PollPolicy,
}

impl OAuthLinkOrchestrator {
    /// Create an orchestrator; `default_policy` applies to providers without an override
    pub fn new(
        gateway: Arc<dyn HealthGateway>,
        store: Arc<ConnectionStateStore>,
        registry: Arc<ProviderRegistry>,
        launcher: Arc<dyn ExternalAgentLauncher>,
        session: Arc<dyn SessionProvider>,
        default_policy: PollPolicy,
    ) -> Self {
        Self {
            gateway,
            store,
            registry,
            launcher,
            session,
            default_policy,
        }
    }

    fn user_id(&self) -> LinkResult<String> {
        self.session
            .current_user_id()
            .ok_or(LinkError::AuthRequired)
    }

    fn oauth_descriptor(&self, provider_id: &str) -> LinkResult<&ProviderDescriptor> {
        self.registry
            .get(provider_id)
            .filter(|descriptor| descriptor.is_oauth())
            .ok_or_else(|| LinkError::unsupported(provider_id))
    }

    /// Start linking: fetch the authorization URL and open it externally
    ///
    /// Any earlier request for the same provider is superseded. Polling does
    /// not start here; it starts when the app regains focus.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired`, `UnsupportedProvider`, a gateway error, or
    /// `LaunchFailed`; gateway and launch failures are also recorded on the
    /// provider's record
    pub async fn initiate(&self, provider_id: &str) -> LinkResult<LinkOutcome> {
        let user_id = self.user_id()?;
        let policy = self
            .oauth_descriptor(provider_id)?
            .poll_policy(self.default_policy);

        let request = self
            .store
            .begin_pending(provider_id, &user_id, policy, PendingPhase::FetchingUrl);
        LinkLogger::log_link_event(&user_id, provider_id, "oauth_initiated", true);

        let answer = self
            .gateway
            .get_authorization_url(provider_id, &user_id)
            .await
            .map_err(LinkError::from)
            .and_then(|answer| validate_authorization_url(answer).map_err(LinkError::from));

        let url = match answer {
            Ok(AuthorizationUrl::Url(url)) => url,
            Ok(AuthorizationUrl::AlreadyLinked) => {
                let linked = self
                    .store
                    .complete_pending(&request, ConnectionStatus::Linked, None);
                return Ok(if linked {
                    LinkLogger::log_link_event(
                        &user_id,
                        provider_id,
                        "oauth_already_linked",
                        true,
                    );
                    LinkOutcome::AlreadyConnected
                } else {
                    LinkOutcome::Superseded
                });
            }
            Err(e) => return self.fail(&request, e),
        };

        if !self.store.advance_pending(
            &request,
            PendingPhase::FetchingUrl,
            PendingPhase::AwaitingExternalAuth,
            ConnectionStatus::AwaitingExternalAuth,
        ) {
            debug!(
                provider = %provider_id,
                request_id = %request.id(),
                "Request superseded before launch"
            );
            return Ok(LinkOutcome::Superseded);
        }

        if let Err(e) = self.launcher.open(&url).await {
            let error = LinkError::LaunchFailed {
                provider: provider_id.to_owned(),
                reason: e.to_string(),
            };
            return self.fail(&request, error);
        }

        info!(
            provider = %provider_id,
            request_id = %request.id(),
            "Authorization opened, waiting for app to regain focus"
        );
        Ok(LinkOutcome::AwaitingExternalAuth)
    }

    /// Record a failure if the request is still current
    ///
    /// A superseded request reports `Superseded` instead of its error.
    fn fail(&self, request: &PendingLinkRequest, error: LinkError) -> LinkResult<LinkOutcome> {
        let recorded = RecordedError::from(&error);
        if !self
            .store
            .complete_pending(request, ConnectionStatus::Failed, Some(recorded))
        {
            return Ok(LinkOutcome::Superseded);
        }
        LinkLogger::log_link_event(
            request.user_id(),
            request.provider_id(),
            "oauth_failed",
            false,
        );
        Err(error)
    }

    /// Start a poll loop for every request waiting on external auth
    ///
    /// Requests already polling are left alone, so repeated foreground events
    /// never start a second loop for the same request.
    pub fn on_app_foreground(&self) -> Vec<JoinHandle<PollOutcome>> {
        self.store
            .pending_requests()
            .into_iter()
            .filter(|request| {
                self.store.advance_pending(
                    request,
                    PendingPhase::AwaitingExternalAuth,
                    PendingPhase::Polling,
                    ConnectionStatus::Polling,
                )
            })
            .map(|request| self.spawn_poll(request))
            .collect()
    }

    /// Poll again for a provider whose earlier attempt was not confirmed
    ///
    /// Returns `None` when a loop is already running or the provider is
    /// already connected.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` or `UnsupportedProvider`
    pub fn check_again(&self, provider_id: &str) -> LinkResult<Option<JoinHandle<PollOutcome>>> {
        let user_id = self.user_id()?;
        let policy = self
            .oauth_descriptor(provider_id)?
            .poll_policy(self.default_policy);

        if let Some(pending) = self.store.pending(provider_id) {
            let started = self.store.advance_pending(
                &pending,
                PendingPhase::AwaitingExternalAuth,
                PendingPhase::Polling,
                ConnectionStatus::Polling,
            );
            return Ok(started.then(|| self.spawn_poll(pending)));
        }

        if self.store.get(provider_id).status.is_connected() {
            return Ok(None);
        }

        let request = self
            .store
            .begin_pending(provider_id, &user_id, policy, PendingPhase::Polling);
        LinkLogger::log_link_event(&user_id, provider_id, "oauth_check_again", true);
        Ok(Some(self.spawn_poll(request)))
    }

    /// Cancel the provider's in-flight link; no-op if nothing is in flight
    pub fn cancel(&self, provider_id: &str) -> bool {
        let cancelled = self.store.cancel_pending(provider_id);
        if cancelled {
            info!(provider = %provider_id, "Link request cancelled");
        }
        cancelled
    }

    /// Cancel every in-flight link
    pub fn cancel_all(&self) -> usize {
        self.store.cancel_all_pending()
    }

    fn spawn_poll(&self, request: PendingLinkRequest) -> JoinHandle<PollOutcome> {
        debug!(
            provider = %request.provider_id(),
            request_id = %request.id(),
            max_attempts = request.policy().max_attempts,
            "Starting completion poll loop"
        );
        let poll = PollLoop::new(Arc::clone(&self.gateway), Arc::clone(&self.store), request);
        tokio::spawn(poll.run())
    }
}

/// Only http(s) URLs are handed to the external agent
fn validate_authorization_url(
    answer: AuthorizationUrl,
) -> Result<AuthorizationUrl, GatewayError> {
    if let AuthorizationUrl::Url(raw) = &answer {
        let malformed = |reason: String| GatewayError::MalformedResponse {
            endpoint: "auth_url",
            reason,
        };
        let parsed =
            Url::parse(raw).map_err(|e| malformed(format!("invalid authorization URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(malformed(format!(
                "authorization URL uses unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
    }
    Ok(answer)
}
