// ABOUTME: JSON cache of the last known connection records for stale-while-revalidate startup
// ABOUTME: Written atomically per user and ignored when it belongs to someone else
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use wearable_core::constants::{cache, service_names};

use super::ConnectionSnapshot;

#[derive(Debug, Serialize, Deserialize)]
struct CachedConnections {
    version: u32,
    user_id: String,
    saved_at: DateTime<Utc>,
    records: ConnectionSnapshot,
}

/// Location of the local connection cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    /// Cache at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache under the platform's local data directory
    #[must_use]
    pub fn default_location() -> Option<Self> {
        dirs::data_local_dir().map(|dir| {
            Self::new(
                dir.join(service_names::WEARABLE_LINK)
                    .join(cache::FILE_NAME),
            )
        })
    }

    /// Path of the cache file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot for `user_id`, replacing any previous cache
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written
    pub async fn save(&self, user_id: &str, records: &ConnectionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }

        let cached = CachedConnections {
            version: cache::FORMAT_VERSION,
            user_id: user_id.to_owned(),
            saved_at: Utc::now(),
            records: records.clone(),
        };
        let body = serde_json::to_vec_pretty(&cached).context("Failed to encode connection cache")?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body)
            .await
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to move cache into {}", self.path.display()))?;

        debug!(path = %self.path.display(), providers = records.len(), "Connection cache saved");
        Ok(())
    }

    /// Read the cached snapshot for `user_id`
    ///
    /// Returns `None` when there is no cache, or it was written by another
    /// user or an incompatible version.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn load(&self, user_id: &str) -> Result<Option<ConnectionSnapshot>> {
        let body = match fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let cached: CachedConnections =
            serde_json::from_slice(&body).context("Failed to parse connection cache")?;

        if cached.version != cache::FORMAT_VERSION || cached.user_id != user_id {
            info!(
                path = %self.path.display(),
                version = cached.version,
                "Ignoring connection cache from another user or version"
            );
            return Ok(None);
        }
        Ok(Some(cached.records))
    }

    /// Delete the cache if present
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
