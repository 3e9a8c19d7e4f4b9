//! Download cache index with explicit freshness.
//!
//! Each downloaded file is recorded under a (source, params) key together
//! with the time it was fetched. A later run reuses the file only while the
//! entry is fresh and the file is still on disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILE: &str = ".cache-index.json";

/// Identifies one download by upstream and canonical parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub source: String,
    pub params: String,
}

impl CacheKey {
    /// Builds a key; parameter pairs are joined in the order given.
    pub fn new(source: impl Into<String>, params: &[(&str, String)]) -> Self {
        let params =
            params.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(";");
        Self { source: source.into(), params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub key: CacheKey,
    pub fetched_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// How long an entry may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    max_age: Duration,
}

impl FreshnessPolicy {
    pub fn max_age_secs(secs: u64) -> Self {
        // Anything past a century is effectively forever
        let secs = secs.min(100 * 365 * 24 * 3600) as i64;
        Self { max_age: Duration::seconds(secs) }
    }

    /// An entry is fresh when its file exists and it is not older than the
    /// maximum age. A zero maximum age is never fresh.
    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if self.max_age <= Duration::zero() || !entry.path.exists() {
            return false;
        }
        now.signed_duration_since(entry.fetched_at) <= self.max_age
    }
}

/// Cache entries persisted as JSON next to the data files.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    #[serde(skip)]
    location: PathBuf,
    entries: Vec<CacheEntry>,
}

impl CacheIndex {
    /// Loads the index from `dir`, starting empty if none exists.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let location = dir.as_ref().join(INDEX_FILE);

        if !location.exists() {
            debug!("No cache index at {}", location.display());
            return Ok(Self { location, entries: Vec::new() });
        }

        let content = std::fs::read_to_string(&location)
            .with_context(|| format!("Failed to read cache index: {}", location.display()))?;
        let mut index: CacheIndex = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache index: {}", location.display()))?;
        index.location = location;
        Ok(index)
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    /// Returns the entry for `key` if the policy still allows reusing it.
    pub fn fresh(
        &self,
        key: &CacheKey,
        policy: FreshnessPolicy,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.get(key).filter(|e| policy.is_fresh(e, now))
    }

    /// Records a download, replacing any entry with the same key or the
    /// same file. A file holds the data of exactly one key.
    pub fn record(&mut self, key: CacheKey, path: impl Into<PathBuf>, fetched_at: DateTime<Utc>) {
        let path = path.into();
        self.entries.retain(|e| e.key != key && e.path != path);
        self.entries.push(CacheEntry { key, fetched_at, path });
    }

    /// Drops every entry pointing at `path`.
    pub fn forget(&mut self, path: &Path) {
        self.entries.retain(|e| e.path != path);
    }

    /// Writes the index back to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.location.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.location, content)
            .with_context(|| format!("Failed to write cache index: {}", self.location.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
