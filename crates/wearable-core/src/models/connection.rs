// ABOUTME: Per-provider connection record and status lifecycle
// ABOUTME: The projection the UI renders and the reconciliation engine refreshes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, LinkErrorKind};

/// Connection status of one provider for the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Never linked, disconnected, or link cancelled
    #[default]
    NotConnected,
    /// Link sequence started (SDK sequence or authorization URL fetch)
    Linking,
    /// External browser launched, waiting for the app to regain focus
    AwaitingExternalAuth,
    /// Checking the backend for completion
    Polling,
    /// Linked and syncing
    Linked,
    /// Linked, but the backend reports data sync as disabled
    SyncDisabled,
    /// Terminal failure; `last_error` says why
    Failed,
}

impl ConnectionStatus {
    /// Whether a link flow is in progress
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Linking | Self::AwaitingExternalAuth | Self::Polling
        )
    }

    /// Whether the provider is connected, regardless of sync state
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Linked | Self::SyncDisabled)
    }
}

/// Error kind and message recorded on a failed or degraded connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedError {
    /// Stable kind for UI guidance
    pub kind: LinkErrorKind,
    /// Diagnostic message
    pub message: String,
}

impl RecordedError {
    /// Build from a kind and message
    pub fn new(kind: LinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&LinkError> for RecordedError {
    fn from(error: &LinkError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

/// Local view of one provider's connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Current status
    pub status: ConnectionStatus,
    /// Last successful data sync
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Error attached to the current status, if any
    pub last_error: Option<RecordedError>,
}

impl ConnectionRecord {
    /// Record for a provider that is not connected
    #[must_use]
    pub fn not_connected() -> Self {
        Self::default()
    }

    /// Record with the given status and no error
    #[must_use]
    pub const fn with_status(status: ConnectionStatus) -> Self {
        Self {
            status,
            last_synced_at: None,
            last_error: None,
        }
    }

    /// Linked record stamped with a sync time
    #[must_use]
    pub const fn linked(last_synced_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status: ConnectionStatus::Linked,
            last_synced_at,
            last_error: None,
        }
    }

    /// Failed record carrying the error
    #[must_use]
    pub const fn failed(error: RecordedError) -> Self {
        Self {
            status: ConnectionStatus::Failed,
            last_synced_at: None,
            last_error: Some(error),
        }
    }

    /// True when the record failed with the given kind
    #[must_use]
    pub fn failed_with(&self, kind: LinkErrorKind) -> bool {
        self.status == ConnectionStatus::Failed
            && self.last_error.as_ref().is_some_and(|e| e.kind == kind)
    }
}

/// Result of a successful `link` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkOutcome {
    /// Linked in-process (SDK providers)
    Linked,
    /// Backend already had the provider connected
    AlreadyConnected,
    /// Browser opened; completion is detected after the app regains focus
    AwaitingExternalAuth,
    /// A newer request for the same provider replaced this one
    Superseded,
}
