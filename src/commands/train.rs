//! Joins macro indicators with Steam prices and fits a linear model.

use crate::config::Config;
use crate::dataset::{self, MacroRow, SteamPriceRow, TrainingRow, MACRO_FILE};
use crate::format::Formatter;
use crate::regression::{self, LinearModel};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Result of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    pub game: String,
    pub year: i32,
    /// Joined training file that was written
    pub output: PathBuf,
    pub model: LinearModel,
}

pub struct TrainCommand {
    config: Config,
}

impl TrainCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Trains and returns formatted output.
    pub fn execute(&self, app_id: u64, name: Option<&str>) -> Result<String> {
        let summary = self.run(app_id, name)?;
        Ok(Formatter::new(self.config.format).format_training(&summary))
    }

    /// Reads the two downloaded datasets, writes the joined file and fits
    /// `real_price ~ ppp + gdp_per_capita + inflation`.
    pub fn run(&self, app_id: u64, name: Option<&str>) -> Result<TrainSummary> {
        let game = name
            .or_else(|| self.config.game_name(app_id))
            .map(str::to_string)
            .unwrap_or_else(|| app_id.to_string());
        let year = self.config.train_year;
        let dir = &self.config.data_dir;

        let macro_path = dir.join(MACRO_FILE);
        if !macro_path.exists() {
            anyhow::bail!(
                "Indicator data not found at {}. Run `steam-ppp indicators` first.",
                macro_path.display()
            );
        }
        let prices_path = dataset::steam_prices_path(dir, app_id);
        if !prices_path.exists() {
            anyhow::bail!(
                "Steam prices not found at {}. Run `steam-ppp export {}` first.",
                prices_path.display(),
                app_id
            );
        }

        let macros: Vec<MacroRow> = dataset::read_csv(&macro_path)?;
        let prices: Vec<SteamPriceRow> = dataset::read_csv(&prices_path)?;
        if prices.is_empty() {
            anyhow::bail!("Steam price file {} has no rows", prices_path.display());
        }

        let rows = dataset::join_training(&macros, &prices, year);
        if rows.is_empty() {
            anyhow::bail!(
                "No country has complete {} indicators and a Steam price for app {}",
                year,
                app_id
            );
        }

        let output = dataset::training_path(dir, year, &game);
        dataset::write_csv(&output, &rows)?;
        info!("Saved {} training rows to {}", rows.len(), output.display());

        let features: Vec<Vec<f64>> = rows.iter().map(TrainingRow::features).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r.real_price).collect();
        let model = regression::fit(&features, &targets)
            .with_context(|| format!("Failed to fit model for {}", game))?;

        info!(samples = model.samples, r_squared = model.r_squared, "Model fitted for {}", game);
        Ok(TrainSummary { game, year, output, model })
    }
}
