// ABOUTME: Main library entry point for the wearable provider linking orchestrator
// ABOUTME: Links SDK and OAuth health providers and reconciles local state with the backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Wearable Link
//!
//! Client-side orchestration of health and wearable provider connections.
//!
//! Two linking modes are supported:
//!
//! - **SDK providers** (Apple Health, Health Connect) link in-process through
//!   the platform SDK: permissions, backend registration, background sync.
//! - **OAuth providers** (Garmin, Oura, Fitbit, ...) link through an external
//!   browser. Completion is detected by a bounded poll loop that starts when
//!   the app regains focus.
//!
//! A single [`store::ConnectionStateStore`] holds the per-provider view the
//! UI renders. The [`reconcile::ReconciliationEngine`] periodically replaces
//! it with the backend's truth. [`service::LinkService`] ties everything
//! together for the host app.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wearable_link::host::StaticSession;
//! use wearable_link::registry::ProviderRegistry;
//! use wearable_link::service::LinkService;
//! use wearable_gateway::{GatewayConfig, HttpHealthGateway};
//!
//! # async fn run(launcher: Arc<dyn wearable_link::host::ExternalAgentLauncher>) {
//! let registry = ProviderRegistry::with_builtin_providers();
//! let gateway = HttpHealthGateway::new(GatewayConfig::default(), registry.iter());
//! let service = LinkService::builder(
//!     Arc::new(gateway),
//!     Arc::new(StaticSession::signed_in("user-123")),
//!     launcher,
//! )
//! .registry(registry)
//! .build();
//!
//! service.link("garmin").await.ok();
//! // ... later, when the app regains focus:
//! let _activity = service.on_app_foreground();
//! # }
//! ```

/// Environment-based configuration
pub mod config;

/// Host collaborator traits
pub mod host;

/// Structured logging setup
pub mod logging;

/// OAuth linking and completion polling
pub mod oauth;

/// Reconciliation against the backend
pub mod reconcile;

/// Provider registry
pub mod registry;

/// Platform SDK linking
pub mod sdk;

/// Link service facade
pub mod service;

/// Connection state store
pub mod store;

pub use wearable_core::errors::{LinkError, LinkErrorKind, LinkResult};
pub use wearable_core::models::{ConnectionRecord, ConnectionStatus, LinkOutcome};
