// ABOUTME: Bounded completion poll loop for an OAuth link request
// ABOUTME: Checks immediately, then at a fixed interval, under an attempt cap and a wall-clock deadline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use wearable_core::errors::LinkError;
use wearable_core::models::{ConnectionStatus, RecordedError};
use wearable_gateway::HealthGateway;

use crate::logging::LinkLogger;
use crate::store::{ConnectionStateStore, PendingLinkRequest};

/// How a poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Backend confirmed the link
    Linked {
        /// Checks performed
        attempts: u32,
    },
    /// Attempts or deadline exhausted; the provider was marked failed
    TimedOut {
        /// Checks performed
        attempts: u32,
    },
    /// Request cancelled or superseded; nothing was written
    Cancelled {
        /// Checks performed
        attempts: u32,
    },
}

/// Drives one pending request to a terminal state
pub(crate) struct PollLoop {
    gateway: Arc<dyn HealthGateway>,
    store: Arc<ConnectionStateStore>,
    request: PendingLinkRequest,
}

impl PollLoop {
    pub(crate) fn new(
        gateway: Arc<dyn HealthGateway>,
        store: Arc<ConnectionStateStore>,
        request: PendingLinkRequest,
    ) -> Self {
        Self {
            gateway,
            store,
            request,
        }
    }

    /// Run until linked, timed out or cancelled
    pub(crate) async fn run(self) -> PollOutcome {
        let policy = self.request.policy();
        let deadline = self
            .request
            .deadline()
            .unwrap_or_else(|| Instant::now() + policy.window());

        let outcome = tokio::select! {
            bounded = time::timeout_at(deadline, self.check_until_linked()) => match bounded {
                Ok(Some(outcome)) => outcome,
                Ok(None) => self.give_up("attempts or window exhausted"),
                Err(_) => self.give_up("deadline reached"),
            },
            () = self.request.cancelled() => PollOutcome::Cancelled {
                attempts: self.request.attempts_made(),
            },
        };
        debug!(
            provider = %self.request.provider_id(),
            request_id = %self.request.id(),
            outcome = ?outcome,
            "Poll loop finished"
        );
        outcome
    }

    /// `None` once every attempt or the window was spent without seeing the link
    async fn check_until_linked(&self) -> Option<PollOutcome> {
        let policy = self.request.policy();
        let provider_id = self.request.provider_id();

        for attempt in 1..=policy.max_attempts {
            if !self.request.is_valid_at(Instant::now()) {
                if self.request.is_cancelled() {
                    return Some(PollOutcome::Cancelled {
                        attempts: attempt - 1,
                    });
                }
                return None;
            }
            self.request.record_attempt();

            match self
                .gateway
                .check_connection(self.request.user_id(), provider_id)
                .await
            {
                Ok(true) => {
                    LinkLogger::log_poll_attempt(provider_id, attempt, policy.max_attempts, true);
                    let written = self.store.complete_pending(
                        &self.request,
                        ConnectionStatus::Linked,
                        None,
                    );
                    return Some(if written {
                        LinkLogger::log_link_event(
                            self.request.user_id(),
                            provider_id,
                            "oauth_linked",
                            true,
                        );
                        PollOutcome::Linked { attempts: attempt }
                    } else {
                        PollOutcome::Cancelled { attempts: attempt }
                    });
                }
                Ok(false) => {
                    LinkLogger::log_poll_attempt(provider_id, attempt, policy.max_attempts, false);
                }
                Err(e) => {
                    warn!(
                        provider = %provider_id,
                        attempt,
                        error = %e,
                        "Completion check failed, retrying on next tick"
                    );
                }
            }

            if attempt < policy.max_attempts {
                time::sleep(policy.interval).await;
            }
        }
        None
    }

    fn give_up(&self, reason: &str) -> PollOutcome {
        let attempts = self.request.attempts_made();
        let error = LinkError::LinkTimedOut {
            provider: self.request.provider_id().to_owned(),
            attempts,
        };
        let written = self.store.complete_pending(
            &self.request,
            ConnectionStatus::Failed,
            Some(RecordedError::from(&error)),
        );
        if !written {
            return PollOutcome::Cancelled { attempts };
        }
        info!(
            provider = %self.request.provider_id(),
            attempts,
            reason,
            "Link not confirmed, user can check again"
        );
        LinkLogger::log_link_event(
            self.request.user_id(),
            self.request.provider_id(),
            "oauth_timed_out",
            false,
        );
        PollOutcome::TimedOut { attempts }
    }
}
