// ABOUTME: Error module organizing link-level and gateway-level error types
// ABOUTME: Re-exports the error taxonomy shared by adapters, orchestrator and gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Errors raised while talking to the remote health gateway
pub mod gateway;

/// Errors raised by link adapters and the OAuth orchestrator
pub mod link;

pub use gateway::GatewayError;
pub use link::{LinkError, LinkErrorKind, LinkResult};
