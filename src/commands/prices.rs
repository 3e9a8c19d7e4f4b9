//! Price comparison command implementation.

use super::{build_normalizer, region_list};
use crate::config::Config;
use crate::format::Formatter;
use crate::normalizer::{PriceNormalizer, ProductQuery, RankBy};
use anyhow::Result;
use tracing::{info, warn};

/// Compares one game's price across the configured regions, PPP-adjusted.
pub struct PricesCommand {
    config: Config,
}

impl PricesCommand {
    /// Creates a new prices command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Fetches prices and returns formatted output.
    pub async fn execute(&self, app_id: u64) -> Result<String> {
        let normalizer = build_normalizer(&self.config)?;
        self.execute_with_normalizer(&normalizer, app_id).await
    }

    /// Fetches prices through a provided normalizer (for testing).
    pub async fn execute_with_normalizer(
        &self,
        normalizer: &PriceNormalizer,
        app_id: u64,
    ) -> Result<String> {
        let query = ProductQuery::new(app_id, self.config.regions.iter().cloned())?;
        info!("Comparing app {} across {}", app_id, region_list(query.regions()));

        let report = normalizer.normalize_detailed(&query, RankBy::AdjustedPrice).await;

        if !report.omitted.is_empty() {
            let skipped: Vec<String> =
                report.omitted.iter().map(|(r, e)| format!("{} ({})", r, e.kind())).collect();
            warn!("Skipped regions: {}", skipped.join(", "));
        }

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_records(&report.records))
    }
}
