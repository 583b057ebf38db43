// ABOUTME: In-process platform SDK linking (Apple Health, Health Connect)
// ABOUTME: Narrow SDK capability trait and the adapter contract the link service drives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Platform SDK linking
//!
//! The host wraps its native health SDK in [`PlatformHealthSdk`]; the
//! [`PlatformSdkAdapter`] runs the permission, registration and sync-enable
//! sequence against it and records the outcome in the store.

/// Generic adapter over a platform SDK
pub mod adapter;

pub use adapter::{PermissionVerification, PlatformSdkAdapter};

use anyhow::Result;
use async_trait::async_trait;
use wearable_core::errors::LinkResult;
use wearable_core::models::LinkOutcome;

/// Answer to a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionRequest {
    /// Permissions granted
    Granted,
    /// User refused
    Denied,
    /// Request shown; the grant lands asynchronously
    RequestSent,
}

/// Capabilities of a platform health SDK
#[async_trait]
pub trait PlatformHealthSdk: Send + Sync {
    /// Whether the SDK finished its own initialization
    fn is_initialized(&self) -> bool;

    /// Ask the user for health data permissions
    async fn request_permissions(&self) -> PermissionRequest;

    /// Whether permissions are currently granted
    async fn has_permissions(&self) -> bool;

    /// Register the user with the aggregation backend
    ///
    /// # Errors
    ///
    /// Returns an error describing why registration was refused
    async fn register_user(&self, user_id: &str) -> Result<()>;

    /// Turn on background data sync; `false` if it could not be enabled
    async fn enable_sync(&self) -> bool;
}

/// Links one SDK provider for a user
#[async_trait]
pub trait SdkLinkAdapter: Send + Sync {
    /// Provider this adapter links
    fn provider_id(&self) -> &str;

    /// Whether the underlying SDK is ready to link
    fn is_ready(&self) -> bool;

    /// Run the full link sequence, writing the outcome to the store
    ///
    /// # Errors
    ///
    /// Returns `SdkNotReady`, `PermissionDenied` or `RegistrationFailed`
    async fn connect(&self, user_id: &str) -> LinkResult<LinkOutcome>;
}
