// ABOUTME: Structured error types for remote health gateway requests
// ABOUTME: Separates transport failures from backend rejections so callers can tell them apart
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use thiserror::Error;

/// Errors returned by the remote health gateway
///
/// `Transport`, `Timeout` and `CircuitOpen` mean the backend could not be asked.
/// `Api` and `Parse` mean it answered, but not with something usable.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS failure, TLS error, body read failure
    #[error("network error: {0}")]
    Transport(String),

    /// Request exceeded its time budget
    #[error("request to {endpoint} timed out after {timeout_secs}s")]
    Timeout {
        /// Logical endpoint name
        endpoint: &'static str,
        /// Budget that was exceeded
        timeout_secs: u64,
    },

    /// Backend answered with a non-success status
    #[error("backend returned {status_code} for {endpoint}: {message}")]
    Api {
        /// Logical endpoint name
        endpoint: &'static str,
        /// HTTP status code
        status_code: u16,
        /// Response body or reason
        message: String,
        /// Whether retrying can help (5xx, 429)
        retryable: bool,
    },

    /// Response body did not match the expected shape
    #[error("failed to parse {field} from backend response")]
    Parse {
        /// Which payload failed to decode
        field: &'static str,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Response decoded but carried none of the expected fields
    #[error("malformed {endpoint} response: {reason}")]
    MalformedResponse {
        /// Logical endpoint name
        endpoint: &'static str,
        /// What was missing or inconsistent
        reason: String,
    },

    /// Circuit breaker is open after repeated transport failures
    #[error("gateway circuit open, retry in {retry_after_secs}s")]
    CircuitOpen {
        /// Seconds until a recovery request is allowed
        retry_after_secs: u64,
    },

    /// Provider id is not in the registry the gateway was built with
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl GatewayError {
    /// True when the backend could not be reached at all
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::CircuitOpen { .. }
        )
    }

    /// True when the same request may succeed later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Parse { .. }
            | Self::MalformedResponse { .. }
            | Self::CircuitOpen { .. }
            | Self::UnknownProvider(_) => false,
        }
    }
}
