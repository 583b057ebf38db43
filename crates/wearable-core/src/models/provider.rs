// ABOUTME: Static provider descriptors and polling policy
// ABOUTME: Describes how a provider links (SDK or OAuth) and which data source key the backend expects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::poll;

/// How a provider is linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Permission and registration happen through an in-process platform SDK
    #[serde(rename = "SDK")]
    Sdk,
    /// User authorizes in an external browser; completion is detected by polling
    #[serde(rename = "OAUTH")]
    OAuth,
}

/// Bounds for the OAuth completion poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Spacing between status checks
    pub interval: Duration,
    /// Slack added to the wall-clock backstop
    pub buffer: Duration,
}

impl PollPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration, buffer: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            buffer,
        }
    }

    /// Longest time a poll loop under this policy may stay alive
    #[must_use]
    pub fn window(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts)
            .saturating_add(self.buffer)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(
            poll::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(poll::DEFAULT_INTERVAL_MS),
            Duration::from_millis(poll::DEFAULT_BUFFER_MS),
        )
    }
}

/// Immutable description of a linkable provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Stable key, e.g. `garmin`
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Linking mode
    pub link_type: LinkType,
    /// Identifier the remote gateway expects for this provider
    pub data_source_key: String,
    /// Provider-specific polling bounds; `None` uses the global policy
    pub poll_override: Option<PollPolicy>,
}

impl ProviderDescriptor {
    /// Describe an OAuth-linked provider
    pub fn oauth(
        id: impl Into<String>,
        display_name: impl Into<String>,
        data_source_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            link_type: LinkType::OAuth,
            data_source_key: data_source_key.into(),
            poll_override: None,
        }
    }

    /// Describe an SDK-linked provider
    pub fn sdk(
        id: impl Into<String>,
        display_name: impl Into<String>,
        data_source_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            link_type: LinkType::Sdk,
            data_source_key: data_source_key.into(),
            poll_override: None,
        }
    }

    /// Attach a provider-specific polling policy
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_override = Some(policy);
        self
    }

    /// Polling policy for this provider, falling back to `default`
    #[must_use]
    pub fn poll_policy(&self, default: PollPolicy) -> PollPolicy {
        self.poll_override.unwrap_or(default)
    }

    /// Whether linking goes through an external browser
    #[must_use]
    pub fn is_oauth(&self) -> bool {
        self.link_type == LinkType::OAuth
    }
}
