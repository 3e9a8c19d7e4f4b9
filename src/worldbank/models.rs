//! Indicator catalogue and World Bank response parsing.

use crate::error::FetchError;
use crate::regions::RegionCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Macro indicators this tool knows how to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// PPP conversion factor, GDP (LCU per international $)
    Ppp,
    /// GDP per capita (current US$)
    GdpPerCapita,
    /// Inflation, consumer prices (annual %)
    Inflation,
}

impl Indicator {
    /// Returns the World Bank indicator code.
    pub fn code(&self) -> &'static str {
        match self {
            Indicator::Ppp => "PA.NUS.PPP",
            Indicator::GdpPerCapita => "NY.GDP.PCAP.CD",
            Indicator::Inflation => "FP.CPI.TOTL.ZG",
        }
    }

    /// Returns the CSV column name.
    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Ppp => "ppp",
            Indicator::GdpPerCapita => "gdp_per_capita",
            Indicator::Inflation => "inflation",
        }
    }

    pub fn all() -> &'static [Indicator] {
        &[Indicator::Ppp, Indicator::GdpPerCapita, Indicator::Inflation]
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indicator::all()
            .iter()
            .find(|i| i.column().eq_ignore_ascii_case(s) || i.code().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                format!("Unknown indicator: {}. Use: ppp, gdp_per_capita, inflation", s)
            })
    }
}

/// One indicator value for one country and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub country: RegionCode,
    pub year: i32,
    pub indicator: Indicator,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct Entry {
    country: EntryRef,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EntryRef {
    id: String,
}

/// Returns the data rows of a `[metadata, rows]` response.
///
/// The API signals errors with a single-element array carrying `message`.
fn data_rows(body: &str) -> Result<Vec<Entry>, FetchError> {
    let value: Value = serde_json::from_str(body)?;

    let mut parts = match value {
        Value::Array(parts) => parts,
        other => {
            return Err(FetchError::Parse(format!("expected JSON array, got {}", kind(&other))))
        }
    };

    if parts.len() < 2 {
        let message = parts
            .first()
            .and_then(|meta| meta.get("message"))
            .and_then(|m| m.get(0))
            .and_then(|m| m.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("response has no data section");
        return Err(FetchError::DataAbsent(message.to_string()));
    }

    match parts.swap_remove(1) {
        Value::Null => Err(FetchError::DataAbsent("no observations".to_string())),
        rows => Ok(serde_json::from_value(rows)?),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extracts the PPP factor: the first row's `value`.
pub fn parse_ppp(body: &str) -> Result<f64, FetchError> {
    let rows = data_rows(body)?;
    rows.first()
        .ok_or_else(|| FetchError::DataAbsent("no observations".to_string()))?
        .value
        .ok_or_else(|| FetchError::DataAbsent("PPP value is null".to_string()))
}

/// Extracts every non-null observation of an indicator series.
pub fn parse_series(body: &str, indicator: Indicator) -> Result<Vec<Observation>, FetchError> {
    let rows = data_rows(body)?;
    let mut observations = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(value) = row.value else { continue };

        let (Ok(country), Ok(year)) = (row.country.id.parse::<RegionCode>(), row.date.parse::<i32>())
        else {
            debug!("Skipping row {} / {}", row.country.id, row.date);
            continue;
        };

        observations.push(Observation { country, year, indicator, value });
    }

    Ok(observations)
}
