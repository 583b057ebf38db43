// ABOUTME: Permission, registration and sync-enable sequence over a platform health SDK
// ABOUTME: Verifies permission grants with delayed re-checks and records LINKED or FAILED in the store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wearable_core::constants::{providers, sdk};
use wearable_core::errors::{LinkError, LinkResult};
use wearable_core::models::{ConnectionRecord, ConnectionStatus, LinkOutcome, RecordedError};

use super::{PermissionRequest, PlatformHealthSdk, SdkLinkAdapter};
use crate::logging::LinkLogger;
use crate::store::ConnectionStateStore;

/// How a permission grant is confirmed after the request returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionVerification {
    /// Delayed re-checks after the immediate one
    pub rechecks: u32,
    /// Delay before each re-check
    pub delay: Duration,
}

impl Default for PermissionVerification {
    fn default() -> Self {
        Self {
            rechecks: sdk::PERMISSION_RECHECKS,
            delay: Duration::from_millis(sdk::PERMISSION_RECHECK_DELAY_MS),
        }
    }
}

/// SDK link adapter for one platform
pub struct PlatformSdkAdapter<S> {
    provider_id: String,
    sdk: S,
    store: Arc<ConnectionStateStore>,
    verification: PermissionVerification,
}

impl<S: PlatformHealthSdk> PlatformSdkAdapter<S> {
    /// Adapter linking `provider_id` through `sdk`
    pub fn new(provider_id: impl Into<String>, sdk: S, store: Arc<ConnectionStateStore>) -> Self {
        Self {
            provider_id: provider_id.into(),
            sdk,
            store,
            verification: PermissionVerification::default(),
        }
    }

    /// Apple Health adapter
    pub fn apple_health(sdk: S, store: Arc<ConnectionStateStore>) -> Self {
        Self::new(providers::APPLE, sdk, store)
    }

    /// Android Health Connect adapter
    pub fn health_connect(sdk: S, store: Arc<ConnectionStateStore>) -> Self {
        Self::new(providers::HEALTH_CONNECT, sdk, store)
    }

    /// Override permission re-check timing
    #[must_use]
    pub const fn with_verification(mut self, verification: PermissionVerification) -> Self {
        self.verification = verification;
        self
    }

    /// Request permissions, then confirm the grant by re-reading it
    async fn ensure_permissions(&self) -> LinkResult<()> {
        let answer = self.sdk.request_permissions().await;
        debug!(provider = %self.provider_id, answer = ?answer, "Permission request returned");
        if answer == PermissionRequest::Denied {
            return Err(self.permission_denied());
        }

        if self.sdk.has_permissions().await {
            return Ok(());
        }
        for recheck in 1..=self.verification.rechecks {
            tokio::time::sleep(self.verification.delay).await;
            if self.sdk.has_permissions().await {
                debug!(provider = %self.provider_id, recheck, "Permission grant confirmed");
                return Ok(());
            }
        }
        Err(self.permission_denied())
    }

    fn permission_denied(&self) -> LinkError {
        LinkError::PermissionDenied {
            provider: self.provider_id.clone(),
        }
    }

    /// Permission and registration are fatal; sync enabling is not
    async fn link_sequence(&self, user_id: &str) -> LinkResult<bool> {
        self.ensure_permissions().await?;

        self.sdk
            .register_user(user_id)
            .await
            .map_err(|e| LinkError::RegistrationFailed {
                provider: self.provider_id.clone(),
                reason: e.to_string(),
            })?;

        let sync_enabled = self.sdk.enable_sync().await;
        if !sync_enabled {
            warn!(
                provider = %self.provider_id,
                user.id = %user_id,
                "Background sync could not be enabled, keeping provider linked"
            );
        }
        Ok(sync_enabled)
    }
}

#[async_trait]
impl<S: PlatformHealthSdk> SdkLinkAdapter for PlatformSdkAdapter<S> {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn is_ready(&self) -> bool {
        self.sdk.is_initialized()
    }

    async fn connect(&self, user_id: &str) -> LinkResult<LinkOutcome> {
        if !self.is_ready() {
            return Err(LinkError::SdkNotReady {
                provider: self.provider_id.clone(),
            });
        }

        self.store
            .set(&self.provider_id, ConnectionStatus::Linking, None);

        match self.link_sequence(user_id).await {
            Ok(sync_enabled) => {
                let mut record = ConnectionRecord::linked(Some(Utc::now()));
                if !sync_enabled {
                    let degraded = LinkError::SyncEnableFailed {
                        provider: self.provider_id.clone(),
                    };
                    record.last_error = Some(RecordedError::from(&degraded));
                }
                self.store.set_record(&self.provider_id, record);
                LinkLogger::log_link_event(user_id, &self.provider_id, "sdk_linked", true);
                Ok(LinkOutcome::Linked)
            }
            Err(e) => {
                self.store.set(
                    &self.provider_id,
                    ConnectionStatus::Failed,
                    Some(RecordedError::from(&e)),
                );
                LinkLogger::log_link_event(user_id, &self.provider_id, "sdk_link_failed", false);
                Err(e)
            }
        }
    }
}
