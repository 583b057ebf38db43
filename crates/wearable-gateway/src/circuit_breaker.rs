// ABOUTME: Circuit breaker for backend calls made by the health gateway
// ABOUTME: Fails fast while the backend is unreachable so poll loops do not pile up requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use wearable_core::errors::GatewayError;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through
    Closed,
    /// Requests fail immediately
    Open,
    /// A single trial request is in flight
    HalfOpen,
}

impl CircuitState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::HalfOpen,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// Thresholds for opening and closing the circuit
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive retryable failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial request is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Lock-free circuit breaker keyed to one backend
///
/// Only retryable errors (transport failures, 5xx, 429) count toward opening.
/// A 4xx answer means the backend is healthy and said no.
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at_ms: AtomicU64,
    config: CircuitBreakerConfig,
    origin: Instant,
}

impl CircuitBreaker {
    /// Create a breaker with the given thresholds
    #[must_use]
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_owned(),
            state: AtomicU8::new(CircuitState::Closed.to_u8()),
            failure_count: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            config,
            origin: Instant::now(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Consecutive failures counted while closed
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn recovery_ms(&self) -> u64 {
        u64::try_from(self.config.recovery_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Admit a request, moving to HalfOpen once the recovery timeout passed
    ///
    /// Admitting a trial request re-arms the timer, so one whose future is dropped
    /// mid-flight only blocks the circuit for one more recovery period.
    fn try_acquire(&self) -> Result<(), GatewayError> {
        let state = self.state();
        if state == CircuitState::Closed {
            return Ok(());
        }

        let now = self.elapsed_ms();
        let since_open = now.saturating_sub(self.opened_at_ms.load(Ordering::SeqCst));
        let recovery = self.recovery_ms();
        if since_open < recovery {
            return Err(GatewayError::CircuitOpen {
                retry_after_secs: (recovery - since_open).div_ceil(1000),
            });
        }

        let admitted = self.state.compare_exchange(
            state.to_u8(),
            CircuitState::HalfOpen.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if admitted.is_ok() {
            self.opened_at_ms.store(now, Ordering::SeqCst);
            info!(gateway = %self.name, "Circuit half-open, admitting one trial request");
            Ok(())
        } else {
            Err(GatewayError::CircuitOpen {
                retry_after_secs: 1,
            })
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        if self.state() != CircuitState::Closed {
            info!(gateway = %self.name, "Circuit closed, backend recovered");
        }
        self.state
            .store(CircuitState::Closed.to_u8(), Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
    }

    /// Record a retryable failure
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.failure_threshold {
                    self.trip();
                    warn!(
                        gateway = %self.name,
                        failures = count,
                        recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                        "Circuit opened, backend failing"
                    );
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                self.trip();
                warn!(gateway = %self.name, "Circuit re-opened, trial request failed");
            }
        }
    }

    fn trip(&self) {
        self.opened_at_ms.store(self.elapsed_ms(), Ordering::SeqCst);
        self.state.store(CircuitState::Open.to_u8(), Ordering::SeqCst);
    }

    /// Run a backend call under circuit protection
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::CircuitOpen` without running `operation` while the
    /// circuit is open, otherwise the operation's own error.
    pub async fn call<F, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        self.try_acquire()?;
        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if error.is_retryable() {
                    self.record_failure();
                } else if self.state() == CircuitState::HalfOpen {
                    // the backend answered, so it is reachable again
                    self.record_success();
                }
                Err(error)
            }
        }
    }
}
