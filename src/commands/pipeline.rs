//! Full batch run: indicators, then export and training per configured game.

use super::{build_normalizer_with, ExportCommand, IndicatorsCommand, TrainCommand};
use crate::config::Config;
use crate::normalizer::PriceNormalizer;
use crate::worldbank::{IndicatorSource, WorldBankClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

pub struct PipelineCommand {
    config: Config,
    force: bool,
}

impl PipelineCommand {
    pub fn new(config: Config, force: bool) -> Self {
        Self { config, force }
    }

    /// Runs against the live APIs, sharing one World Bank client.
    pub async fn execute(&self) -> Result<String> {
        let worldbank = Arc::new(
            WorldBankClient::new(&self.config).context("Failed to create World Bank client")?,
        );
        let normalizer = build_normalizer_with(&self.config, worldbank.clone())?;
        self.run(&normalizer, worldbank.as_ref()).await
    }

    /// Runs with provided sources (for testing). Indicator failure aborts;
    /// a failing game is logged and the next one proceeds.
    pub async fn run(
        &self,
        normalizer: &PriceNormalizer,
        indicators: &impl IndicatorSource,
    ) -> Result<String> {
        let mut lines = Vec::new();

        let outcome = IndicatorsCommand::new(self.config.clone(), self.force)
            .run(indicators)
            .await
            .context("Indicator download failed")?;
        lines.push(outcome.to_string());

        let export = ExportCommand::new(self.config.clone(), self.force);
        let train = TrainCommand::new(self.config.clone());
        let mut failures = 0;

        for game in &self.config.games {
            info!("Processing {} ({})", game.name, game.id);

            let exported = match export.run(normalizer, game.id).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("Export failed for {}: {:#}", game.name, err);
                    lines.push(format!("{}: export failed: {:#}", game.name, err));
                    failures += 1;
                    continue;
                }
            };
            lines.push(format!("{}: {}", game.name, exported));

            if exported.path().is_none() {
                failures += 1;
                continue;
            }

            match train.run(game.id, Some(game.name.as_str())) {
                Ok(summary) => lines.push(format!(
                    "{}: trained on {} samples, R² {:.4}, saved {}",
                    game.name,
                    summary.model.samples,
                    summary.model.r_squared,
                    summary.output.display()
                )),
                Err(err) => {
                    error!("Training failed for {}: {:#}", game.name, err);
                    lines.push(format!("{}: training failed: {:#}", game.name, err));
                    failures += 1;
                }
            }
        }

        lines.push(format!(
            "Processed {} games, {} failed",
            self.config.games.len(),
            failures
        ));
        Ok(lines.join("\n"))
    }
}
