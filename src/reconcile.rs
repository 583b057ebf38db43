// ABOUTME: Reconciliation of local connection records against the backend's view
// ABOUTME: Full refresh, per-provider data sync with category retry, and a periodic background task
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wearable_core::errors::{LinkError, LinkErrorKind, LinkResult};
use wearable_core::models::{ConnectionRecord, ConnectionStatus, SyncResult};
use wearable_gateway::{HealthGateway, RemoteConnection};

use crate::host::SessionProvider;
use crate::logging::LinkLogger;
use crate::registry::ProviderRegistry;
use crate::store::ConnectionStateStore;

/// Outcome of one `reconcile_all` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Status written for each provider whose check succeeded
    pub statuses: HashMap<String, ConnectionStatus>,
    /// Providers whose check failed; their previous record was kept
    pub failed: HashMap<String, LinkErrorKind>,
}

impl ReconcileReport {
    /// Whether every provider was checked
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Record implied by the backend's view of a provider
fn record_from_remote(remote: &RemoteConnection) -> ConnectionRecord {
    if !remote.connected {
        return ConnectionRecord::not_connected();
    }
    let status = if remote.sync_enabled == Some(false) {
        ConnectionStatus::SyncDisabled
    } else {
        ConnectionStatus::Linked
    };
    ConnectionRecord {
        status,
        last_synced_at: remote.last_sync,
        last_error: None,
    }
}

/// Brings the store in line with the backend
#[derive(Clone)]
pub struct ReconciliationEngine {
    gateway: Arc<dyn HealthGateway>,
    store: Arc<ConnectionStateStore>,
    registry: Arc<ProviderRegistry>,
}

impl ReconciliationEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        gateway: Arc<dyn HealthGateway>,
        store: Arc<ConnectionStateStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            gateway,
            store,
            registry,
        }
    }

    /// Refresh the backend, check every provider and replace the store in one step
    ///
    /// Providers whose check fails keep their previous record; providers with
    /// an in-flight link keep it unless the backend reports them connected.
    ///
    /// # Errors
    ///
    /// Returns a gateway error if the backend refresh itself fails; the store
    /// is left untouched in that case
    pub async fn reconcile_all(&self, user_id: &str) -> LinkResult<ReconcileReport> {
        let started = Instant::now();
        self.gateway.sync_provider_connections(user_id).await?;

        let checks = self.read_remote(user_id).await;
        let previous = self.store.snapshot();
        let mut next = HashMap::with_capacity(checks.len());
        let mut report = ReconcileReport::default();

        for (provider_id, remote) in checks {
            match remote {
                Ok(remote) => {
                    let record = record_from_remote(&remote);
                    report.statuses.insert(provider_id.clone(), record.status);
                    next.insert(provider_id, record);
                }
                Err(kind) => {
                    report.failed.insert(provider_id.clone(), kind);
                    if let Some(record) = previous.get(&provider_id) {
                        next.insert(provider_id, record.clone());
                    }
                }
            }
        }

        self.store.bulk_replace(next);
        LinkLogger::log_reconciliation(
            user_id,
            report.statuses.len(),
            report.failed.len(),
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        Ok(report)
    }

    /// One backend read for every registered provider
    ///
    /// A failed listing fails every provider with the same kind.
    async fn read_remote(
        &self,
        user_id: &str,
    ) -> Vec<(String, Result<RemoteConnection, LinkErrorKind>)> {
        let provider_ids: Vec<String> = self
            .registry
            .ids()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let listing = self
            .gateway
            .connection_statuses(user_id, &provider_ids)
            .await;
        match listing {
            Ok(mut statuses) => provider_ids
                .into_iter()
                .map(|provider_id| {
                    let remote = statuses
                        .remove(&provider_id)
                        .unwrap_or_else(|| Ok(RemoteConnection::default()))
                        .map_err(|e| {
                            warn!(
                                provider = %provider_id,
                                user.id = %user_id,
                                error = %e,
                                "Connection check failed, keeping previous record"
                            );
                            LinkError::from(e).kind()
                        });
                    (provider_id, remote)
                })
                .collect(),
            Err(e) => {
                warn!(
                    user.id = %user_id,
                    error = %e,
                    "Connection listing failed, keeping every previous record"
                );
                let kind = LinkError::from(e).kind();
                provider_ids
                    .into_iter()
                    .map(|provider_id| (provider_id, Err(kind)))
                    .collect()
            }
        }
    }

    /// Ask the backend to re-run previously failed category syncs
    ///
    /// Time-bounded by the gateway; a timeout reports `false`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error if the backend rejects the request
    pub async fn retry_failed_data_syncs(&self, user_id: &str) -> LinkResult<bool> {
        let retried = self.gateway.retry_failed_syncs(user_id).await?;
        debug!(user.id = %user_id, retried, "Failed-sync retry requested");
        Ok(retried)
    }

    /// Pull one day of data for a provider, retrying failed categories once
    ///
    /// A result with any successful category stamps `last_synced_at`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error if the data request fails
    pub async fn sync_provider_data(
        &self,
        user_id: &str,
        provider_id: &str,
        date: NaiveDate,
    ) -> LinkResult<SyncResult> {
        if !self.registry.contains(provider_id) {
            return Err(LinkError::unsupported(provider_id));
        }
        let result = self
            .gateway
            .trigger_data_sync(user_id, provider_id, date)
            .await?;

        if result.any_success() {
            self.store.mark_synced(provider_id, Utc::now());
        }
        if result.has_failures() {
            let failed = result.failed_categories();
            info!(
                provider = %provider_id,
                date = %date,
                failed = ?failed,
                "Some categories failed to sync, requesting retry"
            );
            if let Err(e) = self.retry_failed_data_syncs(user_id).await {
                warn!(provider = %provider_id, error = %e, "Failed-sync retry request failed");
            }
        }
        Ok(result)
    }

    /// Reconcile on a fixed period for whoever is signed in
    ///
    /// The first pass runs immediately. Ticks with no signed-in user are
    /// skipped.
    #[must_use]
    pub fn spawn_periodic(
        &self,
        session: Arc<dyn SessionProvider>,
        period: Duration,
    ) -> ReconcileSchedule {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let engine = self.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(user_id) = session.current_user_id() else {
                            debug!("No signed-in user, skipping reconciliation tick");
                            continue;
                        };
                        if let Err(e) = engine.reconcile_all(&user_id).await {
                            warn!(user.id = %user_id, error = %e, "Periodic reconciliation failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Reconciliation task received shutdown signal");
                        break;
                    }
                }
            }
        });

        ReconcileSchedule {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}

/// Handle to the periodic reconciliation task; stops it when dropped
pub struct ReconcileSchedule {
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReconcileSchedule {
    /// Stop the task and wait for it to exit
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconciliation task ended abnormally");
            }
        }
    }
}

impl Drop for ReconcileSchedule {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.shutdown_tx.try_send(()) {
                debug!(
                    error = ?e,
                    "Reconciliation shutdown signal send failed (task likely stopped)"
                );
            }
        }
    }
}
