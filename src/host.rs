// ABOUTME: Host-side collaborators: session identity, external browser launcher and lifecycle events
// ABOUTME: Traits the embedding app implements, plus small in-process implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

/// Source of the authenticated user id
pub trait SessionProvider: Send + Sync {
    /// Current user, or `None` when signed out
    fn current_user_id(&self) -> Option<String>;
}

/// Opens an authorization URL outside the app (system browser, custom tab)
#[async_trait]
pub trait ExternalAgentLauncher: Send + Sync {
    /// Open `url`; returns once the agent has been asked to show it
    ///
    /// # Errors
    ///
    /// Returns an error if the agent could not be launched
    async fn open(&self, url: &str) -> Result<()>;
}

/// App lifecycle transitions the orchestrator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// App returned to the foreground
    Foreground,
    /// App moved to the background
    Background,
}

/// Session holder the host updates on sign-in and sign-out
#[derive(Debug, Default)]
pub struct StaticSession {
    user_id: RwLock<Option<String>>,
}

impl StaticSession {
    /// Session signed in as `user_id`
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    /// Session with no user
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Switch to `user_id`
    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id.into());
    }

    /// Clear the user
    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
