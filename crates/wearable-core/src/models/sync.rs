// ABOUTME: Outcome of one provider data sync, broken down by data category
// ABOUTME: Consumed by the retry engine to decide whether failed categories need another attempt
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data categories pulled from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncCategory {
    Sleep,
    Body,
    Physical,
    Daily,
    Nutrition,
}

impl SyncCategory {
    /// All categories in payload order
    pub const ALL: [Self; 5] = [
        Self::Sleep,
        Self::Body,
        Self::Physical,
        Self::Daily,
        Self::Nutrition,
    ];

    /// Payload key for this category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Body => "body",
            Self::Physical => "physical",
            Self::Daily => "daily",
            Self::Nutrition => "nutrition",
        }
    }
}

/// Result of syncing one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryOutcome {
    Success,
    NoData,
    Error,
}

/// Per-category outcome of a provider data sync for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Provider the data came from
    pub provider_id: String,
    /// Day that was synced
    pub date: NaiveDate,
    /// Outcome per category; categories absent from the payload are omitted
    pub outcomes: BTreeMap<SyncCategory, CategoryOutcome>,
}

impl SyncResult {
    /// Result with no outcomes yet
    pub fn new(provider_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            provider_id: provider_id.into(),
            date,
            outcomes: BTreeMap::new(),
        }
    }

    /// Result for a day the backend had nothing for (HTTP 204)
    pub fn no_data(provider_id: impl Into<String>, date: NaiveDate) -> Self {
        let mut result = Self::new(provider_id, date);
        for category in SyncCategory::ALL {
            result.outcomes.insert(category, CategoryOutcome::NoData);
        }
        result
    }

    /// Set one category outcome
    #[must_use]
    pub fn with_outcome(mut self, category: SyncCategory, outcome: CategoryOutcome) -> Self {
        self.outcomes.insert(category, outcome);
        self
    }

    /// Categories that errored
    #[must_use]
    pub fn failed_categories(&self) -> Vec<SyncCategory> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| **outcome == CategoryOutcome::Error)
            .map(|(category, _)| *category)
            .collect()
    }

    /// Whether any category errored
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.values().any(|o| *o == CategoryOutcome::Error)
    }

    /// Whether any category delivered data
    #[must_use]
    pub fn any_success(&self) -> bool {
        self.outcomes
            .values()
            .any(|o| *o == CategoryOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_failed_categories_lists_only_errors() {
        let result = SyncResult::new("garmin", day())
            .with_outcome(SyncCategory::Sleep, CategoryOutcome::Success)
            .with_outcome(SyncCategory::Body, CategoryOutcome::Error)
            .with_outcome(SyncCategory::Physical, CategoryOutcome::NoData);

        assert_eq!(result.failed_categories(), vec![SyncCategory::Body]);
        assert!(result.has_failures());
        assert!(result.any_success());
    }

    #[test]
    fn test_no_data_marks_every_category() {
        let result = SyncResult::no_data("oura", day());
        assert_eq!(result.outcomes.len(), SyncCategory::ALL.len());
        assert!(!result.has_failures());
        assert!(!result.any_success());
    }
}
