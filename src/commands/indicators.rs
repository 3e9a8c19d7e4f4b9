//! World Bank indicator download to `worldbank_data.csv`.

use super::region_list;
use crate::cache::{CacheIndex, CacheKey, FreshnessPolicy};
use crate::config::Config;
use crate::dataset::{self, MACRO_FILE};
use crate::regions::RegionCode;
use crate::worldbank::{Indicator, IndicatorSource, WorldBankClient};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorsOutcome {
    Written { path: PathBuf, rows: usize, failed: usize },
    Cached { path: PathBuf, fetched_at: DateTime<Utc> },
    Empty,
}

impl fmt::Display for IndicatorsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorsOutcome::Written { path, rows, failed } => {
                write!(f, "Wrote {} indicator rows to {}", rows, path.display())?;
                if *failed > 0 {
                    write!(f, " ({} series failed)", failed)?;
                }
                Ok(())
            }
            IndicatorsOutcome::Cached { path, fetched_at } => write!(
                f,
                "Using cached {} (fetched {})",
                path.display(),
                fetched_at.format("%Y-%m-%d %H:%M UTC")
            ),
            IndicatorsOutcome::Empty => write!(f, "No indicator data returned; nothing written"),
        }
    }
}

/// Downloads every configured indicator for every export region.
pub struct IndicatorsCommand {
    config: Config,
    force: bool,
}

impl IndicatorsCommand {
    /// Creates a new indicators command. `force` ignores the cache.
    pub fn new(config: Config, force: bool) -> Self {
        Self { config, force }
    }

    /// Downloads with the live World Bank client and returns a summary line.
    pub async fn execute(&self) -> Result<String> {
        let client =
            WorldBankClient::new(&self.config).context("Failed to create World Bank client")?;
        Ok(self.run(&client).await?.to_string())
    }

    /// Downloads through a provided source (for testing).
    pub async fn run(&self, source: &impl IndicatorSource) -> Result<IndicatorsOutcome> {
        let (start, end) = (self.config.start_year, self.config.end_year);
        if start > end {
            anyhow::bail!("Invalid year range: {} is after {}", start, end);
        }

        let regions = &self.config.export_regions;
        let indicators = &self.config.indicators;
        let path = self.config.data_dir.join(MACRO_FILE);
        let key = CacheKey::new(
            "worldbank",
            &[
                ("regions", region_list(regions)),
                (
                    "indicators",
                    indicators.iter().map(Indicator::code).collect::<Vec<_>>().join(","),
                ),
                ("years", format!("{}:{}", start, end)),
            ],
        );

        let mut index = CacheIndex::load(&self.config.data_dir)?;
        if !self.force {
            let policy = FreshnessPolicy::max_age_secs(self.config.cache_max_age_secs());
            if let Some(entry) = index.fresh(&key, policy, Utc::now()) {
                info!("Indicator data is fresh, skipping download");
                return Ok(IndicatorsOutcome::Cached {
                    path: entry.path.clone(),
                    fetched_at: entry.fetched_at,
                });
            }
        }

        let jobs: Vec<(RegionCode, Indicator)> = indicators
            .iter()
            .flat_map(|i| regions.iter().map(move |r| (r.clone(), *i)))
            .collect();
        info!("Fetching {} indicator series for {}..={}", jobs.len(), start, end);

        let results: Vec<_> = stream::iter(jobs)
            .map(|(region, indicator)| async move {
                let result = source.series(&region, indicator, start..=end).await;
                (region, indicator, result)
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut observations = Vec::new();
        let mut failed = 0;
        for (region, indicator, result) in results {
            match result {
                Ok(obs) => {
                    debug!(region = %region, %indicator, count = obs.len(), "Series fetched");
                    observations.extend(obs);
                }
                Err(err) => {
                    warn!(region = %region, %indicator, kind = err.kind(), "Series fetch failed: {}", err);
                    failed += 1;
                }
            }
        }

        let rows = dataset::merge_observations(observations);
        if rows.is_empty() {
            warn!("No indicator observations returned, nothing written");
            return Ok(IndicatorsOutcome::Empty);
        }

        dataset::write_csv(&path, &rows)?;
        index.record(key, &path, Utc::now());
        index.save()?;

        info!("Saved {} rows to {}", rows.len(), path.display());
        Ok(IndicatorsOutcome::Written { path, rows: rows.len(), failed })
    }
}
