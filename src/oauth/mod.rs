// ABOUTME: OAuth provider linking through an external browser with completion polling
// ABOUTME: Exposes the orchestrator and the poll loop outcome
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Authorization URL, launch and polling orchestration
pub mod orchestrator;
/// Bounded completion poll loop
pub mod poll;

pub use orchestrator::OAuthLinkOrchestrator;
pub use poll::PollOutcome;
