//! CLI command implementations.

pub mod export;
pub mod indicators;
pub mod pipeline;
pub mod prices;
pub mod train;

pub use export::ExportCommand;
pub use indicators::IndicatorsCommand;
pub use pipeline::PipelineCommand;
pub use prices::PricesCommand;
pub use train::TrainCommand;

use crate::config::Config;
use crate::normalizer::{NormalizerOptions, PriceNormalizer};
use crate::steam::SteamClient;
use crate::worldbank::WorldBankClient;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Builds a normalizer over the live Steam and World Bank clients.
pub fn build_normalizer(config: &Config) -> Result<PriceNormalizer> {
    let worldbank =
        Arc::new(WorldBankClient::new(config).context("Failed to create World Bank client")?);
    build_normalizer_with(config, worldbank)
}

/// Same as [`build_normalizer`] but shares an existing World Bank client.
pub fn build_normalizer_with(
    config: &Config,
    worldbank: Arc<WorldBankClient>,
) -> Result<PriceNormalizer> {
    let steam = SteamClient::new(config).context("Failed to create Steam client")?;
    Ok(PriceNormalizer::new(Arc::new(steam), worldbank, NormalizerOptions::from(config)))
}

/// Joins region codes for cache keys and log lines.
fn region_list(regions: &[crate::regions::RegionCode]) -> String {
    regions.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",")
}
