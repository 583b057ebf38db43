// ABOUTME: Environment-based configuration for the link orchestrator
// ABOUTME: Gateway location and budgets, polling bounds, reconciliation cadence and cache path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::{anyhow, Context, Result};
use std::env;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use wearable_core::constants::{env_keys, gateway, poll, reconcile};
use wearable_core::models::PollPolicy;
use wearable_gateway::http_client::HttpTimeouts;
use wearable_gateway::GatewayConfig;

use crate::store::CacheFile;

/// Complete orchestrator configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Backend client settings
    pub gateway: GatewayConfig,
    /// Default OAuth polling bounds
    pub poll: PollPolicy,
    /// Background reconciliation period
    pub reconcile_interval: Duration,
    /// Minimum spacing between foreground-triggered reconciliations
    pub foreground_reconcile_spacing: Duration,
    /// Local connection cache; `None` disables persistence
    pub cache: Option<CacheFile>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            poll: PollPolicy::default(),
            reconcile_interval: Duration::from_secs(reconcile::DEFAULT_INTERVAL_SECS),
            foreground_reconcile_spacing: Duration::from_secs(
                reconcile::FOREGROUND_MIN_SPACING_SECS,
            ),
            cache: CacheFile::default_location(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparsable, or the
    /// resulting configuration is invalid
    pub fn from_env() -> Result<Self> {
        let gateway = GatewayConfig {
            base_url: env_var_or(env_keys::GATEWAY_URL, gateway::DEFAULT_BASE_URL),
            bearer_token: env::var(env_keys::GATEWAY_TOKEN)
                .ok()
                .filter(|token| !token.is_empty()),
            timeouts: HttpTimeouts {
                request: Duration::from_secs(parse_env(
                    env_keys::HTTP_TIMEOUT_SECS,
                    gateway::DEFAULT_TIMEOUT_SECS,
                )?),
                connect: Duration::from_secs(parse_env(
                    env_keys::CONNECT_TIMEOUT_SECS,
                    gateway::DEFAULT_CONNECT_TIMEOUT_SECS,
                )?),
            },
            retry_timeout: Duration::from_secs(parse_env(
                env_keys::RETRY_TIMEOUT_SECS,
                gateway::DEFAULT_RETRY_TIMEOUT_SECS,
            )?),
            ..GatewayConfig::default()
        };

        let poll = PollPolicy::new(
            parse_env(env_keys::POLL_MAX_ATTEMPTS, poll::DEFAULT_MAX_ATTEMPTS)?,
            Duration::from_millis(parse_env(
                env_keys::POLL_INTERVAL_MS,
                poll::DEFAULT_INTERVAL_MS,
            )?),
            Duration::from_millis(parse_env(env_keys::POLL_BUFFER_MS, poll::DEFAULT_BUFFER_MS)?),
        );

        let cache = match env::var(env_keys::CACHE_PATH) {
            Ok(path) if path.eq_ignore_ascii_case("off") => None,
            Ok(path) if !path.is_empty() => Some(CacheFile::new(PathBuf::from(path))),
            _ => CacheFile::default_location(),
        };

        let config = Self {
            gateway,
            poll,
            reconcile_interval: Duration::from_secs(parse_env(
                env_keys::RECONCILE_INTERVAL_SECS,
                reconcile::DEFAULT_INTERVAL_SECS,
            )?),
            cache,
            ..Self::default()
        };

        config.validate()?;
        info!(
            gateway.url = %config.gateway.base_url,
            poll.max_attempts = config.poll.max_attempts,
            poll.interval_ms = config.poll.interval.as_millis(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let scheme = self
            .gateway
            .base_url
            .split_once("://")
            .map(|(scheme, _)| scheme);
        if !matches!(scheme, Some("http" | "https")) {
            return Err(anyhow!(
                "{} must be an http(s) URL, got '{}'",
                env_keys::GATEWAY_URL,
                self.gateway.base_url
            ));
        }
        if self.poll.max_attempts == 0 {
            return Err(anyhow!("{} must be at least 1", env_keys::POLL_MAX_ATTEMPTS));
        }
        if self.poll.interval.is_zero() {
            return Err(anyhow!("{} must be positive", env_keys::POLL_INTERVAL_MS));
        }
        if self.reconcile_interval.is_zero() {
            return Err(anyhow!(
                "{} must be positive",
                env_keys::RECONCILE_INTERVAL_SECS
            ));
        }
        Ok(())
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value '{raw}'")),
        Err(_) => Ok(default),
    }
}
