// ABOUTME: Core types and constants for wearable provider linking
// ABOUTME: Foundation crate with the link error taxonomy, connection data model, and defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Wearable Core
//!
//! Shared types for the wearable linking workspace. This crate is designed to
//! change infrequently: the gateway client and the orchestrator both build on it.
//!
//! ## Modules
//!
//! - **errors**: `LinkError`, `GatewayError` and the serializable `LinkErrorKind`
//! - **models**: provider descriptors, connection records, sync results
//! - **constants**: polling, gateway and reconciliation defaults

/// Link and gateway error types
pub mod errors;

/// Provider, connection and sync data model
pub mod models;

/// Default values and well-known identifiers
pub mod constants;
