//! Raw Steam price export to `steam_prices_{app_id}.csv`.

use super::{build_normalizer, region_list};
use crate::cache::{CacheIndex, CacheKey, FreshnessPolicy};
use crate::config::Config;
use crate::dataset::{self, SteamPriceRow};
use crate::normalizer::{PriceNormalizer, ProductQuery, RankBy};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// What an export run did.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize, omitted: usize },
    Cached { path: PathBuf, fetched_at: DateTime<Utc> },
    Empty { app_id: u64 },
}

impl ExportOutcome {
    /// Path of the price file, if one exists after the run.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ExportOutcome::Written { path, .. } | ExportOutcome::Cached { path, .. } => Some(path),
            ExportOutcome::Empty { .. } => None,
        }
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutcome::Written { path, rows, omitted } => {
                write!(f, "Wrote {} prices to {}", rows, path.display())?;
                if *omitted > 0 {
                    write!(f, " ({} regions skipped)", omitted)?;
                }
                Ok(())
            }
            ExportOutcome::Cached { path, fetched_at } => write!(
                f,
                "Using cached {} (fetched {})",
                path.display(),
                fetched_at.format("%Y-%m-%d %H:%M UTC")
            ),
            ExportOutcome::Empty { app_id } => {
                write!(f, "No prices found for app {}; nothing written", app_id)
            }
        }
    }
}

/// Writes one game's observed prices for the export regions.
pub struct ExportCommand {
    config: Config,
    force: bool,
}

impl ExportCommand {
    /// Creates a new export command. `force` ignores the cache.
    pub fn new(config: Config, force: bool) -> Self {
        Self { config, force }
    }

    /// Exports with live clients and returns a summary line.
    pub async fn execute(&self, app_id: u64) -> Result<String> {
        let normalizer = build_normalizer(&self.config)?;
        Ok(self.run(&normalizer, app_id).await?.to_string())
    }

    /// Exports through a provided normalizer (for testing).
    pub async fn run(&self, normalizer: &PriceNormalizer, app_id: u64) -> Result<ExportOutcome> {
        let query = ProductQuery::new(app_id, self.config.export_regions.iter().cloned())?;
        let path = dataset::steam_prices_path(&self.config.data_dir, app_id);
        let key = CacheKey::new(
            "steam",
            &[("app_id", app_id.to_string()), ("regions", region_list(query.regions()))],
        );

        let mut index = CacheIndex::load(&self.config.data_dir)?;
        if !self.force {
            let policy = FreshnessPolicy::max_age_secs(self.config.cache_max_age_secs());
            if let Some(entry) = index.fresh(&key, policy, Utc::now()) {
                info!("Steam prices for app {} are fresh, skipping download", app_id);
                return Ok(ExportOutcome::Cached {
                    path: entry.path.clone(),
                    fetched_at: entry.fetched_at,
                });
            }
        }

        info!("Exporting app {} across {}", app_id, region_list(query.regions()));
        let report = normalizer.normalize_detailed(&query, RankBy::ObservedPrice).await;

        if report.records.is_empty() {
            warn!("No Steam prices for app {}, nothing written", app_id);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                index.forget(&path);
                index.save()?;
                warn!("Removed stale {}", path.display());
            }
            return Ok(ExportOutcome::Empty { app_id });
        }

        let rows: Vec<SteamPriceRow> = report.records.iter().map(SteamPriceRow::from).collect();
        dataset::write_csv(&path, &rows)?;

        index.record(key, &path, Utc::now());
        index.save()?;

        info!("Saved {} rows to {}", rows.len(), path.display());
        Ok(ExportOutcome::Written { path, rows: rows.len(), omitted: report.omitted.len() })
    }
}
