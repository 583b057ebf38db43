// ABOUTME: Scripted fakes for the remote gateway, platform SDK and external launcher
// ABOUTME: Record every call so tests can assert on attempt counts and side effects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use wearable_core::errors::GatewayError;
use wearable_core::models::SyncResult;
use wearable_gateway::{AuthorizationUrl, HealthGateway, RemoteConnection};
use wearable_link::host::ExternalAgentLauncher;
use wearable_link::sdk::{PermissionRequest, PlatformHealthSdk};

/// One scripted answer to `check_connection`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAnswer {
    Linked,
    NotLinked,
    TransportError,
}

fn transport_error() -> GatewayError {
    GatewayError::Transport("connection reset by peer".to_owned())
}

/// In-memory gateway with scripted answers
///
/// `check_connection` pops the provider's script first and falls back to the
/// `linked` set once the script is empty. `connection_status` (used by
/// reconciliation) never touches the script.
#[derive(Default)]
pub struct FakeGateway {
    auth_answer: Mutex<Option<std::result::Result<AuthorizationUrl, String>>>,
    auth_gate: Mutex<Option<Arc<Notify>>>,
    check_gate: Mutex<Option<Arc<Notify>>>,
    check_scripts: Mutex<HashMap<String, VecDeque<CheckAnswer>>>,
    linked: Mutex<HashSet<String>>,
    remote: Mutex<HashMap<String, RemoteConnection>>,
    failing_status: Mutex<HashSet<String>>,
    fail_sync_connections: Mutex<bool>,
    sync_result: Mutex<Option<SyncResult>>,
    check_calls: Mutex<HashMap<String, u32>>,
    disconnected: Mutex<Vec<String>>,
    auth_calls: AtomicU32,
    sync_connections_calls: AtomicU32,
    status_calls: AtomicU32,
    data_sync_calls: AtomicU32,
    retry_calls: AtomicU32,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_url_for(provider_id: &str) -> String {
        format!("https://auth.example.com/{provider_id}/authorize?state=abc")
    }

    /// Answer the next authorization URL requests with `answer`
    pub fn answer_auth_with(&self, answer: AuthorizationUrl) {
        *self.auth_answer.lock().unwrap() = Some(Ok(answer));
    }

    /// Fail authorization URL requests with a transport error
    pub fn fail_auth_url(&self) {
        *self.auth_answer.lock().unwrap() = Some(Err("auth".to_owned()));
    }

    /// Hold authorization URL requests until the returned gate is notified
    pub fn gate_auth_url(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.auth_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn ungate_auth_url(&self) {
        *self.auth_gate.lock().unwrap() = None;
    }

    /// Hold completion checks until the returned gate is notified
    pub fn gate_checks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.check_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn ungate_checks(&self) {
        *self.check_gate.lock().unwrap() = None;
    }

    pub fn script_checks(&self, provider_id: &str, answers: &[CheckAnswer]) {
        self.check_scripts
            .lock()
            .unwrap()
            .entry(provider_id.to_owned())
            .or_default()
            .extend(answers.iter().copied());
    }

    pub fn set_linked(&self, provider_id: &str, linked: bool) {
        let mut set = self.linked.lock().unwrap();
        if linked {
            set.insert(provider_id.to_owned());
        } else {
            set.remove(provider_id);
        }
    }

    /// Full remote view returned by `connection_status`
    pub fn set_remote(&self, provider_id: &str, remote: RemoteConnection) {
        self.remote
            .lock()
            .unwrap()
            .insert(provider_id.to_owned(), remote);
    }

    pub fn fail_status_for(&self, provider_id: &str) {
        self.failing_status
            .lock()
            .unwrap()
            .insert(provider_id.to_owned());
    }

    pub fn fail_sync_connections(&self, fail: bool) {
        *self.fail_sync_connections.lock().unwrap() = fail;
    }

    pub fn set_sync_result(&self, result: SyncResult) {
        *self.sync_result.lock().unwrap() = Some(result);
    }

    pub fn check_calls(&self, provider_id: &str) -> u32 {
        self.check_calls
            .lock()
            .unwrap()
            .get(provider_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.disconnected.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> u32 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn sync_connections_calls(&self) -> u32 {
        self.sync_connections_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn data_sync_calls(&self) -> u32 {
        self.data_sync_calls.load(Ordering::SeqCst)
    }

    pub fn retry_calls(&self) -> u32 {
        self.retry_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthGateway for FakeGateway {
    async fn get_authorization_url(
        &self,
        provider_id: &str,
        _user_id: &str,
    ) -> Result<AuthorizationUrl, GatewayError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.auth_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let answer = self.auth_answer.lock().unwrap().clone();
        match answer {
            None => Ok(AuthorizationUrl::Url(Self::auth_url_for(provider_id))),
            Some(Ok(answer)) => Ok(answer),
            Some(Err(_)) => Err(transport_error()),
        }
    }

    async fn check_connection(
        &self,
        _user_id: &str,
        provider_id: &str,
    ) -> Result<bool, GatewayError> {
        *self
            .check_calls
            .lock()
            .unwrap()
            .entry(provider_id.to_owned())
            .or_default() += 1;
        let gate = self.check_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self
            .check_scripts
            .lock()
            .unwrap()
            .get_mut(provider_id)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(CheckAnswer::Linked) => Ok(true),
            Some(CheckAnswer::NotLinked) => Ok(false),
            Some(CheckAnswer::TransportError) => Err(transport_error()),
            None => Ok(self.linked.lock().unwrap().contains(provider_id)),
        }
    }

    async fn connection_status(
        &self,
        _user_id: &str,
        provider_id: &str,
    ) -> Result<RemoteConnection, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_status.lock().unwrap().contains(provider_id) {
            return Err(transport_error());
        }
        if let Some(remote) = self.remote.lock().unwrap().get(provider_id) {
            return Ok(remote.clone());
        }
        Ok(RemoteConnection {
            connected: self.linked.lock().unwrap().contains(provider_id),
            ..RemoteConnection::default()
        })
    }

    async fn sync_provider_connections(&self, _user_id: &str) -> Result<(), GatewayError> {
        self.sync_connections_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_sync_connections.lock().unwrap() {
            return Err(transport_error());
        }
        Ok(())
    }

    async fn trigger_data_sync(
        &self,
        _user_id: &str,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<SyncResult, GatewayError> {
        self.data_sync_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.sync_result.lock().unwrap().clone();
        Ok(scripted.unwrap_or_else(|| SyncResult::no_data(provider_id, date)))
    }

    async fn retry_failed_syncs(&self, _user_id: &str) -> Result<bool, GatewayError> {
        self.retry_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn disconnect(&self, _user_id: &str, provider_id: &str) -> Result<(), GatewayError> {
        self.disconnected
            .lock()
            .unwrap()
            .push(provider_id.to_owned());
        self.set_linked(provider_id, false);
        Ok(())
    }
}

/// Launcher that records opened URLs instead of showing them
#[derive(Default)]
pub struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalAgentLauncher for RecordingLauncher {
    async fn open(&self, url: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("no browser available"));
        }
        self.opened.lock().unwrap().push(url.to_owned());
        Ok(())
    }
}

#[derive(Default)]
struct SdkState {
    has_permission_calls: AtomicU32,
    registered: Mutex<Vec<String>>,
    enable_sync_calls: AtomicU32,
}

/// Platform SDK fake; clones share call counters
#[derive(Clone)]
pub struct FakeSdk {
    pub initialized: bool,
    pub permission_answer: PermissionRequest,
    /// `has_permissions` turns true on this call (1-based); `None` never grants
    pub granted_on_check: Option<u32>,
    pub registration_error: Option<String>,
    pub sync_enabled: bool,
    pub state: Arc<SdkState>,
}

impl Default for FakeSdk {
    fn default() -> Self {
        Self::granting()
    }
}

impl FakeSdk {
    /// Ready SDK that grants everything immediately
    pub fn granting() -> Self {
        Self {
            initialized: true,
            permission_answer: PermissionRequest::Granted,
            granted_on_check: Some(1),
            registration_error: None,
            sync_enabled: true,
            state: Arc::new(SdkState::default()),
        }
    }

    pub fn has_permission_calls(&self) -> u32 {
        self.state.has_permission_calls.load(Ordering::SeqCst)
    }

    pub fn registered(&self) -> Vec<String> {
        self.state.registered.lock().unwrap().clone()
    }

    pub fn enable_sync_calls(&self) -> u32 {
        self.state.enable_sync_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformHealthSdk for FakeSdk {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn request_permissions(&self) -> PermissionRequest {
        self.permission_answer
    }

    async fn has_permissions(&self) -> bool {
        let call = self.state.has_permission_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.granted_on_check.is_some_and(|granted| call >= granted)
    }

    async fn register_user(&self, user_id: &str) -> Result<()> {
        if let Some(reason) = &self.registration_error {
            return Err(anyhow!("{reason}"));
        }
        self.state
            .registered
            .lock()
            .unwrap()
            .push(user_id.to_owned());
        Ok(())
    }

    async fn enable_sync(&self) -> bool {
        self.state.enable_sync_calls.fetch_add(1, Ordering::SeqCst);
        self.sync_enabled
    }
}
