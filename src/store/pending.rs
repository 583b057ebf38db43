// ABOUTME: In-flight OAuth link request with its own cancellation flag and poll bookkeeping
// ABOUTME: Shared between the store and a poll loop; writes are accepted only while it is current
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;
use wearable_core::models::PollPolicy;

/// Stage of an OAuth link request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPhase {
    /// Waiting for the backend to return an authorization URL
    FetchingUrl,
    /// Browser launched; nothing happens until the app regains focus
    AwaitingExternalAuth,
    /// A poll loop owns the request
    Polling,
}

impl PendingPhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::FetchingUrl,
            1 => Self::AwaitingExternalAuth,
            _ => Self::Polling,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::FetchingUrl => 0,
            Self::AwaitingExternalAuth => 1,
            Self::Polling => 2,
        }
    }
}

struct PendingInner {
    id: Uuid,
    provider_id: String,
    user_id: String,
    policy: PollPolicy,
    created_at: Instant,
    phase: AtomicU8,
    attempts: AtomicU32,
    polling_started_at: OnceLock<Instant>,
    cancel: watch::Sender<bool>,
}

/// Handle to one in-flight OAuth link attempt
///
/// Cloning shares the same request. At most one request per provider is
/// registered in the store; a replaced request is cancelled and its writes
/// are dropped.
#[derive(Clone)]
pub struct PendingLinkRequest {
    inner: Arc<PendingInner>,
}

impl PendingLinkRequest {
    pub(crate) fn new(
        provider_id: &str,
        user_id: &str,
        policy: PollPolicy,
        phase: PendingPhase,
    ) -> Self {
        let now = Instant::now();
        let polling_started_at = OnceLock::new();
        if phase == PendingPhase::Polling {
            let _ = polling_started_at.set(now);
        }
        let (cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(PendingInner {
                id: Uuid::new_v4(),
                provider_id: provider_id.to_owned(),
                user_id: user_id.to_owned(),
                policy,
                created_at: now,
                phase: AtomicU8::new(phase.to_u8()),
                attempts: AtomicU32::new(0),
                polling_started_at,
                cancel,
            }),
        }
    }

    /// Unique id of this attempt
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Provider being linked
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.inner.provider_id
    }

    /// User the link is for
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Polling bounds captured when the request was created
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.inner.policy
    }

    /// When the request was created
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PendingPhase {
        PendingPhase::from_u8(self.inner.phase.load(Ordering::SeqCst))
    }

    /// Status checks performed so far
    #[must_use]
    pub fn attempts_made(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// When polling started, if it has
    #[must_use]
    pub fn polling_started_at(&self) -> Option<Instant> {
        self.inner.polling_started_at.get().copied()
    }

    /// Wall-clock deadline of the poll loop, once polling started
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.polling_started_at()
            .map(|started| started + self.inner.policy.window())
    }

    /// Whether the request was cancelled or superseded
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// Whether the request may still perform work at `now`
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        !self.is_cancelled()
            && self.attempts_made() <= self.inner.policy.max_attempts
            && self.deadline().is_none_or(|deadline| now < deadline)
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancel.subscribe();
        // the sender lives in `self`, so the channel cannot close under us
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    /// Move `from -> to`; fails if another caller already moved the request
    pub(crate) fn advance(&self, from: PendingPhase, to: PendingPhase) -> bool {
        let moved = self
            .inner
            .phase
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved && to == PendingPhase::Polling {
            let _ = self.inner.polling_started_at.set(Instant::now());
        }
        moved
    }

    /// Count one status check, returning the attempt number
    pub(crate) fn record_attempt(&self) -> u32 {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_same(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for PendingLinkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLinkRequest")
            .field("id", &self.inner.id)
            .field("provider_id", &self.inner.provider_id)
            .field("phase", &self.phase())
            .field("attempts", &self.attempts_made())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
