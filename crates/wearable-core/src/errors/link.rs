// ABOUTME: Link error taxonomy shared by SDK adapters, OAuth orchestrator and reconciliation
// ABOUTME: Pairs a rich error enum with a serializable kind recorded on connection records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::gateway::GatewayError;

/// Stable error kinds recorded on a `ConnectionRecord`
///
/// The UI renders provider-specific guidance from the kind, never from the
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkErrorKind {
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    #[serde(rename = "SDK_NOT_READY")]
    SdkNotReady,
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,
    #[serde(rename = "REGISTRATION_FAILED")]
    RegistrationFailed,
    #[serde(rename = "SYNC_ENABLE_FAILED")]
    SyncEnableFailed,
    #[serde(rename = "TRANSPORT_ERROR")]
    TransportError,
    #[serde(rename = "BACKEND_REJECTED")]
    BackendRejected,
    #[serde(rename = "LINK_TIMED_OUT")]
    LinkTimedOut,
    #[serde(rename = "UNSUPPORTED_PROVIDER")]
    UnsupportedProvider,
    #[serde(rename = "LAUNCH_FAILED")]
    LaunchFailed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl LinkErrorKind {
    /// Short user-facing description of this kind
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "You need to be signed in to link a provider",
            Self::SdkNotReady => "The health platform is still starting up",
            Self::PermissionDenied => "Health data permissions were not granted",
            Self::RegistrationFailed => "The provider could not register your account",
            Self::SyncEnableFailed => "Background sync could not be enabled",
            Self::TransportError => "The linking service could not be reached",
            Self::BackendRejected => "The linking service rejected the request",
            Self::LinkTimedOut => "We did not see the authorization complete in time",
            Self::UnsupportedProvider => "This provider cannot be linked this way",
            Self::LaunchFailed => "The authorization page could not be opened",
            Self::Cancelled => "The link request was cancelled",
        }
    }

    /// Whether this kind may be written to a connection record
    ///
    /// `Cancelled` is internal: a superseded request never writes.
    #[must_use]
    pub const fn is_recordable(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for LinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors returned by link operations
#[derive(Debug, Error)]
pub enum LinkError {
    /// No authenticated user is available
    #[error("authentication required")]
    AuthRequired,

    /// Platform SDK has not completed its own initialization
    #[error("platform SDK for {provider} is not ready")]
    SdkNotReady {
        /// Provider id
        provider: String,
    },

    /// Platform permissions were not granted after verification
    #[error("health permissions denied for {provider}")]
    PermissionDenied {
        /// Provider id
        provider: String,
    },

    /// The aggregation backend refused to register the user
    #[error("registration with {provider} failed: {reason}")]
    RegistrationFailed {
        /// Provider id
        provider: String,
        /// Reason reported by the SDK
        reason: String,
    },

    /// Background sync could not be enabled (non-fatal during linking)
    #[error("enabling background sync for {provider} failed")]
    SyncEnableFailed {
        /// Provider id
        provider: String,
    },

    /// Remote health gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Polling exhausted its attempts without observing a link
    #[error("link for {provider} not confirmed after {attempts} attempts")]
    LinkTimedOut {
        /// Provider id
        provider: String,
        /// Attempts performed
        attempts: u32,
    },

    /// Provider is unknown or uses a different linking mode
    #[error("provider {provider} is not supported for this operation")]
    UnsupportedProvider {
        /// Provider id
        provider: String,
    },

    /// External agent could not open the authorization URL
    #[error("failed to launch authorization for {provider}: {reason}")]
    LaunchFailed {
        /// Provider id
        provider: String,
        /// Launcher-reported reason
        reason: String,
    },

    /// Request was superseded or cancelled; never surfaced to the UI
    #[error("link request for {provider} was cancelled")]
    Cancelled {
        /// Provider id
        provider: String,
    },
}

impl LinkError {
    /// Stable kind for recording and UI mapping
    #[must_use]
    pub const fn kind(&self) -> LinkErrorKind {
        match self {
            Self::AuthRequired => LinkErrorKind::AuthRequired,
            Self::SdkNotReady { .. } => LinkErrorKind::SdkNotReady,
            Self::PermissionDenied { .. } => LinkErrorKind::PermissionDenied,
            Self::RegistrationFailed { .. } => LinkErrorKind::RegistrationFailed,
            Self::SyncEnableFailed { .. } => LinkErrorKind::SyncEnableFailed,
            Self::Gateway(e) => {
                if e.is_transport() {
                    LinkErrorKind::TransportError
                } else {
                    LinkErrorKind::BackendRejected
                }
            }
            Self::LinkTimedOut { .. } => LinkErrorKind::LinkTimedOut,
            Self::UnsupportedProvider { .. } => LinkErrorKind::UnsupportedProvider,
            Self::LaunchFailed { .. } => LinkErrorKind::LaunchFailed,
            Self::Cancelled { .. } => LinkErrorKind::Cancelled,
        }
    }

    /// Create an unsupported-provider error
    pub fn unsupported(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            provider: provider.into(),
        }
    }

    /// Create a cancellation marker
    pub fn cancelled(provider: impl Into<String>) -> Self {
        Self::Cancelled {
            provider: provider.into(),
        }
    }
}

/// Result alias for link operations
pub type LinkResult<T> = Result<T, LinkError>;
