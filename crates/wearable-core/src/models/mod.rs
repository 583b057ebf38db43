// ABOUTME: Data model for provider descriptors, connection records and sync results
// ABOUTME: Plain serializable types shared by the gateway client and the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

mod connection;
mod provider;
mod sync;

pub use connection::{ConnectionRecord, ConnectionStatus, LinkOutcome, RecordedError};
pub use provider::{LinkType, PollPolicy, ProviderDescriptor};
pub use sync::{CategoryOutcome, SyncCategory, SyncResult};
