// ABOUTME: Registry of linkable providers keyed by provider id
// ABOUTME: Ships the built-in SDK and OAuth descriptors and accepts additional registrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;
use tracing::{info, warn};
use wearable_core::constants::providers;
use wearable_core::models::{LinkType, ProviderDescriptor};

/// Static provider table
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    descriptors: BTreeMap<String, ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider
    #[must_use]
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            registry.register(descriptor);
        }
        info!(
            "Provider registry initialized with {} provider(s): {:?}",
            registry.len(),
            registry.ids()
        );
        registry
    }

    /// Add or replace a descriptor
    pub fn register(&mut self, descriptor: ProviderDescriptor) {
        if let Some(previous) = self.descriptors.insert(descriptor.id.clone(), descriptor) {
            warn!(provider = %previous.id, "Provider descriptor replaced");
        }
    }

    /// Descriptor for a provider id
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.get(provider_id)
    }

    /// Whether the provider is registered
    #[must_use]
    pub fn contains(&self, provider_id: &str) -> bool {
        self.descriptors.contains_key(provider_id)
    }

    /// All descriptors ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.descriptors.values()
    }

    /// Registered ids ordered
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    /// Descriptors using the given link mode
    pub fn by_link_type(&self, link_type: LinkType) -> impl Iterator<Item = &ProviderDescriptor> {
        self.iter().filter(move |d| d.link_type == link_type)
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn builtin_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::sdk(providers::APPLE, "Apple Health", "APPLE"),
        ProviderDescriptor::sdk(providers::HEALTH_CONNECT, "Health Connect", "HEALTH_CONNECT"),
        ProviderDescriptor::oauth(providers::GARMIN, "Garmin", "GARMIN"),
        ProviderDescriptor::oauth(providers::OURA, "Oura", "OURA"),
        ProviderDescriptor::oauth(providers::FITBIT, "Fitbit", "FITBIT"),
        ProviderDescriptor::oauth(providers::WHOOP, "WHOOP", "WHOOP"),
        ProviderDescriptor::oauth(providers::POLAR, "Polar", "POLAR"),
        ProviderDescriptor::oauth(providers::WITHINGS, "Withings", "WITHINGS"),
    ]
}
