// ABOUTME: Link service facade composing the store, SDK adapters, OAuth orchestrator and reconciliation
// ABOUTME: Entry point for the host app: link, foreground handling, disconnect, logout and observation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wearable_core::errors::{LinkError, LinkResult};
use wearable_core::models::{
    ConnectionRecord, ConnectionStatus, LinkOutcome, LinkType, SyncResult,
};
use wearable_gateway::HealthGateway;

use crate::config::LinkConfig;
use crate::host::{ExternalAgentLauncher, LifecycleEvent, SessionProvider};
use crate::logging::LinkLogger;
use crate::oauth::{OAuthLinkOrchestrator, PollOutcome};
use crate::reconcile::{ReconcileReport, ReconcileSchedule, ReconciliationEngine};
use crate::registry::ProviderRegistry;
use crate::sdk::SdkLinkAdapter;
use crate::store::{CacheFile, ConnectionSnapshot, ConnectionStateStore};

/// Work started by a foreground event
#[derive(Debug, Default)]
pub struct ForegroundActivity {
    /// Poll loops started for requests waiting on external auth
    pub polls: Vec<JoinHandle<PollOutcome>>,
    /// Opportunistic reconciliation, if one was due
    pub reconcile: Option<JoinHandle<LinkResult<ReconcileReport>>>,
}

/// Local cache kept in step with the store for the signed-in user
struct CacheSync {
    file: CacheFile,
    store: Arc<ConnectionStateStore>,
    session: Arc<dyn SessionProvider>,
    // orders saves against logout's reset-and-delete
    lock: AsyncMutex<()>,
}

impl CacheSync {
    /// Save the current records; an empty store is never written
    async fn persist(&self) {
        let _guard = self.lock.lock().await;
        let Some(user_id) = self.session.current_user_id() else {
            return;
        };
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return;
        }
        if let Err(e) = self.file.save(&user_id, &snapshot).await {
            warn!(user.id = %user_id, error = %e, "Failed to persist connection cache");
        }
    }

    /// Run `reset` and delete the file with no save in between
    async fn clear_after<T>(&self, reset: impl FnOnce() -> T) -> T {
        let _guard = self.lock.lock().await;
        let value = reset();
        if let Err(e) = self.file.clear().await {
            warn!(error = %e, "Failed to remove connection cache on logout");
        }
        value
    }

    /// Save after every store change until the service is dropped
    fn spawn_writer(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            debug!("No async runtime, connection cache is written on reconcile only");
            return None;
        };
        let sync = Arc::clone(self);
        let mut changes = sync.store.subscribe();
        Some(runtime.spawn(async move {
            while changes.changed().await.is_ok() {
                sync.persist().await;
            }
        }))
    }
}

/// Builder for [`LinkService`]
pub struct LinkServiceBuilder {
    gateway: Arc<dyn HealthGateway>,
    session: Arc<dyn SessionProvider>,
    launcher: Arc<dyn ExternalAgentLauncher>,
    registry: ProviderRegistry,
    store: Option<Arc<ConnectionStateStore>>,
    sdk_adapters: HashMap<String, Arc<dyn SdkLinkAdapter>>,
    config: LinkConfig,
}

impl LinkServiceBuilder {
    /// Replace the provider registry (defaults to the built-in providers)
    #[must_use]
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share an existing store, e.g. one SDK adapters were built with
    #[must_use]
    pub fn store(mut self, store: Arc<ConnectionStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the adapter for an SDK provider
    #[must_use]
    pub fn sdk_adapter(mut self, adapter: Arc<dyn SdkLinkAdapter>) -> Self {
        self.sdk_adapters
            .insert(adapter.provider_id().to_owned(), adapter);
        self
    }

    /// Use the given configuration (polling, cadence, cache)
    #[must_use]
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the service
    #[must_use]
    pub fn build(self) -> LinkService {
        let registry = Arc::new(self.registry);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(ConnectionStateStore::new()));
        let oauth = OAuthLinkOrchestrator::new(
            Arc::clone(&self.gateway),
            Arc::clone(&store),
            Arc::clone(&registry),
            self.launcher,
            Arc::clone(&self.session),
            self.config.poll,
        );
        let reconciler = ReconciliationEngine::new(
            Arc::clone(&self.gateway),
            Arc::clone(&store),
            Arc::clone(&registry),
        );

        let cache = self.config.cache.map(|file| {
            Arc::new(CacheSync {
                file,
                store: Arc::clone(&store),
                session: Arc::clone(&self.session),
                lock: AsyncMutex::new(()),
            })
        });
        let cache_writer = cache.as_ref().and_then(CacheSync::spawn_writer);

        LinkService {
            registry,
            store,
            gateway: self.gateway,
            session: self.session,
            oauth,
            reconciler,
            sdk_adapters: self.sdk_adapters,
            cache,
            cache_writer,
            reconcile_interval: self.config.reconcile_interval,
            foreground_spacing: self.config.foreground_reconcile_spacing,
            last_foreground_reconcile: Mutex::new(None),
        }
    }
}

/// Provider linking for the signed-in user
pub struct LinkService {
    registry: Arc<ProviderRegistry>,
    store: Arc<ConnectionStateStore>,
    gateway: Arc<dyn HealthGateway>,
    session: Arc<dyn SessionProvider>,
    oauth: OAuthLinkOrchestrator,
    reconciler: ReconciliationEngine,
    sdk_adapters: HashMap<String, Arc<dyn SdkLinkAdapter>>,
    cache: Option<Arc<CacheSync>>,
    cache_writer: Option<JoinHandle<()>>,
    reconcile_interval: Duration,
    foreground_spacing: Duration,
    last_foreground_reconcile: Mutex<Option<Instant>>,
}

impl LinkService {
    /// Start building a service from its required collaborators
    pub fn builder(
        gateway: Arc<dyn HealthGateway>,
        session: Arc<dyn SessionProvider>,
        launcher: Arc<dyn ExternalAgentLauncher>,
    ) -> LinkServiceBuilder {
        LinkServiceBuilder {
            gateway,
            session,
            launcher,
            registry: ProviderRegistry::with_builtin_providers(),
            store: None,
            sdk_adapters: HashMap::new(),
            config: LinkConfig::default(),
        }
    }

    fn user_id(&self) -> LinkResult<String> {
        self.session
            .current_user_id()
            .ok_or(LinkError::AuthRequired)
    }

    /// Registered providers
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Shared connection store
    #[must_use]
    pub fn store(&self) -> &Arc<ConnectionStateStore> {
        &self.store
    }

    /// OAuth orchestrator
    #[must_use]
    pub fn oauth(&self) -> &OAuthLinkOrchestrator {
        &self.oauth
    }

    /// Reconciliation engine
    #[must_use]
    pub fn reconciler(&self) -> &ReconciliationEngine {
        &self.reconciler
    }

    /// Link a provider, dispatching on its link type
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedProvider` for unknown providers or SDK providers
    /// with no adapter, otherwise the adapter's or orchestrator's error
    pub async fn link(&self, provider_id: &str) -> LinkResult<LinkOutcome> {
        let descriptor = self
            .registry
            .get(provider_id)
            .ok_or_else(|| LinkError::unsupported(provider_id))?;

        match descriptor.link_type {
            LinkType::OAuth => self.oauth.initiate(provider_id).await,
            LinkType::Sdk => {
                let adapter = self
                    .sdk_adapters
                    .get(provider_id)
                    .ok_or_else(|| LinkError::unsupported(provider_id))?;
                let user_id = self.user_id()?;
                adapter.connect(&user_id).await
            }
        }
    }

    /// Handle the app regaining focus
    ///
    /// Starts poll loops for requests waiting on external auth and, when the
    /// last one is old enough, an opportunistic reconciliation.
    pub fn on_app_foreground(&self) -> ForegroundActivity {
        let polls = self.oauth.on_app_foreground();
        let reconcile = self.user_id().ok().and_then(|user_id| {
            if !self.foreground_reconcile_due() {
                return None;
            }
            let engine = self.reconciler.clone();
            Some(tokio::spawn(async move { engine.reconcile_all(&user_id).await }))
        });
        debug!(
            polls = polls.len(),
            reconcile = reconcile.is_some(),
            "Foreground event handled"
        );
        ForegroundActivity { polls, reconcile }
    }

    fn foreground_reconcile_due(&self) -> bool {
        let mut last = self
            .last_foreground_reconcile
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let due = last.is_none_or(|at| now.duration_since(at) >= self.foreground_spacing);
        if due {
            *last = Some(now);
        }
        due
    }

    /// Poll again for an OAuth provider whose link was not confirmed
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` or `UnsupportedProvider`
    pub fn check_again(&self, provider_id: &str) -> LinkResult<Option<JoinHandle<PollOutcome>>> {
        self.oauth.check_again(provider_id)
    }

    /// Cancel an in-flight OAuth link
    pub fn cancel(&self, provider_id: &str) -> bool {
        self.oauth.cancel(provider_id)
    }

    /// Reconcile every provider for the signed-in user, then persist the result
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` or the gateway error that aborted reconciliation
    pub async fn reconcile(&self) -> LinkResult<ReconcileReport> {
        let user_id = self.user_id()?;
        let report = self.reconciler.reconcile_all(&user_id).await?;
        self.persist().await;
        Ok(report)
    }

    /// Ask the backend to retry previously failed category syncs
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` or a gateway error
    pub async fn retry_failed_syncs(&self) -> LinkResult<bool> {
        let user_id = self.user_id()?;
        self.reconciler.retry_failed_data_syncs(&user_id).await
    }

    /// Pull one day of data for a connected provider
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired`, `UnsupportedProvider` or a gateway error
    pub async fn sync_provider_data(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> LinkResult<SyncResult> {
        let user_id = self.user_id()?;
        self.reconciler
            .sync_provider_data(&user_id, provider_id, date)
            .await
    }

    /// Disconnect a provider on the backend and reset its record
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired`, `UnsupportedProvider` or a gateway error; the
    /// local record is left unchanged on failure
    pub async fn disconnect(&self, provider_id: &str) -> LinkResult<()> {
        let user_id = self.user_id()?;
        if !self.registry.contains(provider_id) {
            return Err(LinkError::unsupported(provider_id));
        }
        self.gateway.disconnect(&user_id, provider_id).await?;
        self.store
            .set(provider_id, ConnectionStatus::NotConnected, None);
        LinkLogger::log_link_event(&user_id, provider_id, "disconnected", true);
        self.persist().await;
        Ok(())
    }

    /// Cancel all link work and forget every record
    pub async fn logout(&self) {
        let reset = || {
            let cancelled = self.oauth.cancel_all();
            self.store.reset();
            cancelled
        };
        let cancelled = match &self.cache {
            Some(cache) => cache.clear_after(reset).await,
            None => reset(),
        };
        info!(cancelled, "Link state cleared on logout");
    }

    /// Seed the store from the local cache for the signed-in user
    ///
    /// Returns how many records were restored. Only meaningful before the
    /// first write; cached records are shown until reconciliation replaces
    /// them.
    pub async fn restore_cached(&self) -> usize {
        let (Some(cache), Ok(user_id)) = (&self.cache, self.user_id()) else {
            return 0;
        };
        match cache.file.load(&user_id).await {
            Ok(Some(records)) => {
                let seeded = ConnectionStateStore::with_records(records).snapshot();
                let restored = seeded.len();
                self.store.bulk_replace(seeded);
                debug!(user.id = %user_id, restored, "Connection records restored from cache");
                restored
            }
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable connection cache");
                0
            }
        }
    }

    async fn persist(&self) {
        if let Some(cache) = &self.cache {
            cache.persist().await;
        }
    }

    /// Current record for a provider
    #[must_use]
    pub fn record(&self, provider_id: &str) -> ConnectionRecord {
        self.store.get(provider_id)
    }

    /// Every record
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.store.snapshot()
    }

    /// Receiver notified on every record change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.store.subscribe()
    }

    /// Start background reconciliation at the configured period
    #[must_use]
    pub fn spawn_periodic_reconcile(&self) -> ReconcileSchedule {
        self.reconciler
            .spawn_periodic(Arc::clone(&self.session), self.reconcile_interval)
    }

    /// Forward lifecycle events from the host until the channel closes
    pub fn spawn_lifecycle_listener(
        self: Arc<Self>,
        mut events: mpsc::Receiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    LifecycleEvent::Foreground => {
                        let activity = self.on_app_foreground();
                        debug!(polls = activity.polls.len(), "Lifecycle foreground processed");
                    }
                    LifecycleEvent::Background => {
                        debug!("App moved to background");
                    }
                }
            }
            debug!("Lifecycle event channel closed");
        })
    }
}

impl Drop for LinkService {
    fn drop(&mut self) {
        if let Some(writer) = self.cache_writer.take() {
            writer.abort();
        }
    }
}
