//! CSV datasets: Steam price exports, merged macro indicators, training rows.

use crate::normalizer::RegionPriceRecord;
use crate::regions::RegionCode;
use crate::worldbank::{Indicator, Observation};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the merged indicator file.
pub const MACRO_FILE: &str = "worldbank_data.csv";

pub fn steam_prices_path(dir: &Path, app_id: u64) -> PathBuf {
    dir.join(format!("steam_prices_{}.csv", app_id))
}

pub fn training_path(dir: &Path, year: i32, game: &str) -> PathBuf {
    dir.join(format!("combined_train_{}_{}.csv", year, game))
}

/// One row of `steam_prices_{app_id}.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamPriceRow {
    pub country: RegionCode,
    pub price: f64,
    pub currency: String,
}

impl From<&RegionPriceRecord> for SteamPriceRow {
    fn from(record: &RegionPriceRecord) -> Self {
        Self {
            country: record.region_code().clone(),
            price: record.observed_price(),
            currency: record.currency().to_string(),
        }
    }
}

/// One (country, year) row of the merged indicator file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRow {
    pub country: RegionCode,
    pub year: i32,
    pub ppp: Option<f64>,
    pub gdp_per_capita: Option<f64>,
    pub inflation: Option<f64>,
}

impl MacroRow {
    fn empty(country: RegionCode, year: i32) -> Self {
        Self { country, year, ppp: None, gdp_per_capita: None, inflation: None }
    }

    fn set(&mut self, indicator: Indicator, value: f64) {
        match indicator {
            Indicator::Ppp => self.ppp = Some(value),
            Indicator::GdpPerCapita => self.gdp_per_capita = Some(value),
            Indicator::Inflation => self.inflation = Some(value),
        }
    }
}

/// A macro row joined with a Steam price, ready for regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub country: RegionCode,
    pub year: i32,
    pub ppp: f64,
    pub gdp_per_capita: f64,
    pub inflation: f64,
    pub price: f64,
    pub currency: String,
    pub real_price: f64,
}

/// Regression feature columns, in the order of [`TrainingRow::features`].
pub const FEATURE_NAMES: [&str; 3] = ["ppp", "gdp_per_capita", "inflation"];

impl TrainingRow {
    pub fn features(&self) -> Vec<f64> {
        vec![self.ppp, self.gdp_per_capita, self.inflation]
    }
}

/// Outer-merges observations on (country, year), sorted by country then year.
pub fn merge_observations(observations: impl IntoIterator<Item = Observation>) -> Vec<MacroRow> {
    let mut rows: BTreeMap<(RegionCode, i32), MacroRow> = BTreeMap::new();

    for obs in observations {
        rows.entry((obs.country.clone(), obs.year))
            .or_insert_with(|| MacroRow::empty(obs.country.clone(), obs.year))
            .set(obs.indicator, obs.value);
    }

    rows.into_values().collect()
}

/// Inner-joins `year`'s macro rows with Steam prices on country.
///
/// Rows missing any feature, or with a zero PPP factor, are dropped.
pub fn join_training(macro_rows: &[MacroRow], prices: &[SteamPriceRow], year: i32) -> Vec<TrainingRow> {
    let by_country: BTreeMap<&RegionCode, &MacroRow> =
        macro_rows.iter().filter(|r| r.year == year).map(|r| (&r.country, r)).collect();

    prices
        .iter()
        .filter_map(|p| {
            let m = by_country.get(&p.country)?;
            let (ppp, gdp, inflation) = (m.ppp?, m.gdp_per_capita?, m.inflation?);
            if ppp == 0.0 {
                return None;
            }
            Some(TrainingRow {
                country: p.country.clone(),
                year,
                ppp,
                gdp_per_capita: gdp,
                inflation,
                price: p.price,
                currency: p.currency.clone(),
                real_price: p.price / ppp,
            })
        })
        .collect()
}

/// Writes rows with a header derived from the row type.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}
