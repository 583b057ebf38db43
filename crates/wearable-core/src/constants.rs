// ABOUTME: Default values and well-known identifiers organized by domain
// ABOUTME: Polling bounds, gateway endpoints, reconciliation cadence and environment keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// OAuth completion polling defaults
pub mod poll {
    /// Status checks per poll loop
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    /// Fixed spacing between status checks
    pub const DEFAULT_INTERVAL_MS: u64 = 3_000;
    /// Processing slack added to `attempts * interval` for the wall-clock backstop
    pub const DEFAULT_BUFFER_MS: u64 = 5_000;
}

/// Platform SDK linking defaults
pub mod sdk {
    /// Delay before re-checking a permission grant reported as "request sent"
    pub const PERMISSION_RECHECK_DELAY_MS: u64 = 1_000;
    /// Delayed re-checks after the immediate one
    pub const PERMISSION_RECHECKS: u32 = 2;
}

/// Remote health gateway defaults and endpoint paths
pub mod gateway {
    /// Base URL used when none is configured
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/wearables";
    /// Whole-request timeout
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// TCP connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Upper bound on how long `retry_failed_syncs` may block its caller
    pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 15;

    /// Authorization URL request
    pub const AUTH_URL_PATH: &str = "/auth-url";
    /// Connection listing, and per-source deletion under it
    pub const CONNECTIONS_PATH: &str = "/connections";
    /// Backend-side refresh from the aggregation service
    pub const SYNC_CONNECTIONS_PATH: &str = "/sync-connections";
    /// Per-day provider data pull
    pub const DATA_PATH: &str = "/data";
    /// Re-attempt of previously failed category syncs
    pub const SYNC_RETRY_PATH: &str = "/sync-retry";
}

/// Reconciliation cadence
pub mod reconcile {
    /// Coarse background reconciliation period
    pub const DEFAULT_INTERVAL_SECS: u64 = 300;
    /// Minimum spacing between foreground-triggered reconciliations
    pub const FOREGROUND_MIN_SPACING_SECS: u64 = 30;
}

/// Local connection cache
pub mod cache {
    /// Format version; caches written with another version are ignored
    pub const FORMAT_VERSION: u32 = 1;
    /// File name under the platform data directory
    pub const FILE_NAME: &str = "connections.json";
}

/// Built-in provider identifiers
pub mod providers {
    /// Apple Health (in-process SDK)
    pub const APPLE: &str = "apple";
    /// Android Health Connect (in-process SDK)
    pub const HEALTH_CONNECT: &str = "health_connect";
    /// Garmin Connect
    pub const GARMIN: &str = "garmin";
    /// Oura ring
    pub const OURA: &str = "oura";
    /// Fitbit
    pub const FITBIT: &str = "fitbit";
    /// WHOOP
    pub const WHOOP: &str = "whoop";
    /// Polar
    pub const POLAR: &str = "polar";
    /// Withings
    pub const WITHINGS: &str = "withings";
}

/// Environment variable names read by the configuration layer
pub mod env_keys {
    pub const GATEWAY_URL: &str = "WEARABLE_GATEWAY_URL";
    pub const GATEWAY_TOKEN: &str = "WEARABLE_GATEWAY_TOKEN";
    pub const HTTP_TIMEOUT_SECS: &str = "WEARABLE_HTTP_TIMEOUT_SECS";
    pub const CONNECT_TIMEOUT_SECS: &str = "WEARABLE_CONNECT_TIMEOUT_SECS";
    pub const RETRY_TIMEOUT_SECS: &str = "WEARABLE_RETRY_TIMEOUT_SECS";
    pub const POLL_MAX_ATTEMPTS: &str = "WEARABLE_POLL_MAX_ATTEMPTS";
    pub const POLL_INTERVAL_MS: &str = "WEARABLE_POLL_INTERVAL_MS";
    pub const POLL_BUFFER_MS: &str = "WEARABLE_POLL_BUFFER_MS";
    pub const RECONCILE_INTERVAL_SECS: &str = "WEARABLE_RECONCILE_INTERVAL_SECS";
    pub const CACHE_PATH: &str = "WEARABLE_CACHE_PATH";
}

/// Service names used in structured logs
pub mod service_names {
    /// Default service name
    pub const WEARABLE_LINK: &str = "wearable-link";
}
