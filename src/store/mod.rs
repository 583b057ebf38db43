// ABOUTME: Connection state store, the single source of truth the UI renders from
// ABOUTME: Holds per-provider records and the pending-request table behind one write lock
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Connection state store
//!
//! Records are published through a `watch` channel, so readers always see a
//! complete snapshot and `bulk_replace` is atomic. Every write goes through a
//! single mutex that also guards the pending-request table; the lock order is
//! always table first, then the published map.

/// In-flight OAuth request handle
pub mod pending;
/// Local cache file for cold starts
pub mod persistence;

pub use pending::{PendingLinkRequest, PendingPhase};
pub use persistence::CacheFile;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;
use wearable_core::models::{ConnectionRecord, ConnectionStatus, PollPolicy, RecordedError};

/// Full map of provider id to connection record
pub type ConnectionSnapshot = HashMap<String, ConnectionRecord>;

/// Observable per-provider connection state
pub struct ConnectionStateStore {
    pending: Mutex<HashMap<String, PendingLinkRequest>>,
    records: watch::Sender<ConnectionSnapshot>,
}

impl Default for ConnectionStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateStore {
    /// Empty store; every provider reads as not connected
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(HashMap::new())
    }

    /// Store seeded from a cached snapshot
    ///
    /// In-flight statuses cannot survive a restart without their pending
    /// request, so they are loaded as not connected.
    #[must_use]
    pub fn with_records(mut records: ConnectionSnapshot) -> Self {
        for record in records.values_mut() {
            if record.status.is_in_flight() {
                *record = ConnectionRecord::not_connected();
            }
        }
        let (records, _) = watch::channel(records);
        Self {
            pending: Mutex::new(HashMap::new()),
            records,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingLinkRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, provider_id: &str, status: ConnectionStatus, error: Option<RecordedError>) {
        self.records.send_modify(|records| {
            let record = records.entry(provider_id.to_owned()).or_default();
            record.status = status;
            record.last_error = error;
        });
    }

    fn write_record(&self, provider_id: &str, record: ConnectionRecord) {
        self.records.send_modify(|records| {
            records.insert(provider_id.to_owned(), record);
        });
    }

    /// Current record for a provider (not connected if never written)
    #[must_use]
    pub fn get(&self, provider_id: &str) -> ConnectionRecord {
        self.records
            .borrow()
            .get(provider_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Copy of every record
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.records.borrow().clone()
    }

    /// Receiver notified on every change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.records.subscribe()
    }

    /// Set status and error, keeping the last sync time
    ///
    /// Unguarded writers supersede any pending request for the provider, so a
    /// poll loop can never overwrite this value afterwards.
    pub fn set(&self, provider_id: &str, status: ConnectionStatus, error: Option<RecordedError>) {
        let mut table = self.table();
        if let Some(previous) = table.remove(provider_id) {
            previous.cancel();
            debug!(
                provider = %provider_id,
                request_id = %previous.id(),
                "Pending request superseded by direct write"
            );
        }
        self.write(provider_id, status, error);
    }

    /// Replace a provider's whole record, superseding any pending request
    pub fn set_record(&self, provider_id: &str, record: ConnectionRecord) {
        let mut table = self.table();
        if let Some(previous) = table.remove(provider_id) {
            previous.cancel();
        }
        self.write_record(provider_id, record);
    }

    /// Stamp a successful data sync
    pub fn mark_synced(&self, provider_id: &str, at: DateTime<Utc>) {
        let _table = self.table();
        self.records.send_modify(|records| {
            if let Some(record) = records.get_mut(provider_id) {
                record.last_synced_at = Some(at);
            }
        });
    }

    /// Replace every record in one step
    ///
    /// A provider with a live pending request keeps its in-flight record
    /// unless the replacement reports it connected; in that case the request
    /// is cancelled, since a linked provider has no pending request. A
    /// `LINKING` record with no pending request belongs to an SDK link still
    /// in progress and is kept under the same rule.
    pub fn bulk_replace(&self, replacement: ConnectionSnapshot) {
        let mut table = self.table();
        let current = self.records.borrow().clone();
        let mut next = replacement;

        table.retain(|provider_id, request| {
            let connected = next
                .get(provider_id)
                .is_some_and(|record| record.status.is_connected());
            if connected {
                request.cancel();
                debug!(
                    provider = %provider_id,
                    "Reconciliation observed link, closing pending request"
                );
                return false;
            }
            if let Some(in_flight) = current.get(provider_id) {
                next.insert(provider_id.clone(), in_flight.clone());
            }
            true
        });

        // SDK links hold LINKING without a pending request
        for (provider_id, record) in &current {
            if record.status != ConnectionStatus::Linking || table.contains_key(provider_id) {
                continue;
            }
            let connected = next
                .get(provider_id)
                .is_some_and(|replacement| replacement.status.is_connected());
            if !connected {
                next.insert(provider_id.clone(), record.clone());
            }
        }

        self.records.send_replace(next);
    }

    /// Register a new pending request, cancelling any previous one
    ///
    /// Writes `LINKING` (or `POLLING` when starting directly in that phase).
    pub fn begin_pending(
        &self,
        provider_id: &str,
        user_id: &str,
        policy: PollPolicy,
        phase: PendingPhase,
    ) -> PendingLinkRequest {
        let request = PendingLinkRequest::new(provider_id, user_id, policy, phase);
        let mut table = self.table();
        if let Some(previous) = table.insert(provider_id.to_owned(), request.clone()) {
            previous.cancel();
            debug!(
                provider = %provider_id,
                superseded = %previous.id(),
                request_id = %request.id(),
                "New link request superseded previous one"
            );
        }
        let status = match phase {
            PendingPhase::Polling => ConnectionStatus::Polling,
            PendingPhase::FetchingUrl | PendingPhase::AwaitingExternalAuth => {
                ConnectionStatus::Linking
            }
        };
        self.write(provider_id, status, None);
        request
    }

    fn is_current(
        table: &HashMap<String, PendingLinkRequest>,
        request: &PendingLinkRequest,
    ) -> bool {
        !request.is_cancelled()
            && table
                .get(request.provider_id())
                .is_some_and(|current| current.is_same(request))
    }

    /// Advance a current request to a new phase and publish the status
    ///
    /// Returns `false`, writing nothing, if the request is stale or another
    /// caller already advanced it.
    pub fn advance_pending(
        &self,
        request: &PendingLinkRequest,
        from: PendingPhase,
        to: PendingPhase,
        status: ConnectionStatus,
    ) -> bool {
        let table = self.table();
        if !Self::is_current(&table, request) || !request.advance(from, to) {
            return false;
        }
        self.write(request.provider_id(), status, None);
        true
    }

    /// Resolve a current request with a terminal status and clear it
    ///
    /// Returns `false`, writing nothing, if the request is stale.
    pub fn complete_pending(
        &self,
        request: &PendingLinkRequest,
        status: ConnectionStatus,
        error: Option<RecordedError>,
    ) -> bool {
        let mut table = self.table();
        if !Self::is_current(&table, request) {
            return false;
        }
        table.remove(request.provider_id());
        self.write(request.provider_id(), status, error);
        true
    }

    /// Current pending request for a provider
    #[must_use]
    pub fn pending(&self, provider_id: &str) -> Option<PendingLinkRequest> {
        self.table().get(provider_id).cloned()
    }

    /// Every pending request
    #[must_use]
    pub fn pending_requests(&self) -> Vec<PendingLinkRequest> {
        self.table().values().cloned().collect()
    }

    /// Providers with a pending request
    #[must_use]
    pub fn pending_providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = self.table().keys().cloned().collect();
        providers.sort();
        providers
    }

    /// Cancel a provider's pending request and return it to not connected
    ///
    /// No-op, returning `false`, when nothing is in flight.
    pub fn cancel_pending(&self, provider_id: &str) -> bool {
        let mut table = self.table();
        let Some(request) = table.remove(provider_id) else {
            return false;
        };
        request.cancel();
        self.write(provider_id, ConnectionStatus::NotConnected, None);
        true
    }

    /// Cancel every pending request, returning how many were cancelled
    pub fn cancel_all_pending(&self) -> usize {
        let mut table = self.table();
        let count = table.len();
        let providers: Vec<String> = table
            .drain()
            .map(|(provider_id, request)| {
                request.cancel();
                provider_id
            })
            .collect();
        self.records.send_modify(|records| {
            for provider_id in &providers {
                records.insert(provider_id.clone(), ConnectionRecord::not_connected());
            }
        });
        count
    }

    /// Drop all state, cancelling pending requests (logout)
    pub fn reset(&self) {
        let mut table = self.table();
        for (_, request) in table.drain() {
            request.cancel();
        }
        self.records.send_replace(HashMap::new());
    }
}
