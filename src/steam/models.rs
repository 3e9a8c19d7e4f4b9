//! Data models for the Steam `appdetails` response.

use crate::error::FetchError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Regional price of one product, in major currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontPrice {
    /// Price the buyer pays now
    pub observed_price: f64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Price before discount
    pub initial_price: Option<f64>,
    pub discount_percent: Option<u32>,
}

/// Top level of `appdetails`: app id (as string) to envelope.
pub type AppDetailsResponse = HashMap<String, AppDetailsEnvelope>;

#[derive(Debug, Clone, Deserialize)]
pub struct AppDetailsEnvelope {
    #[serde(default)]
    pub success: bool,
    /// Steam sends `[]` instead of an object for free titles when filtering.
    #[serde(default, deserialize_with = "object_or_none")]
    pub data: Option<AppData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price_overview: Option<PriceOverview>,
}

/// Prices are integers in minor units (cents, grosze).
#[derive(Debug, Clone, Deserialize)]
pub struct PriceOverview {
    pub currency: Option<String>,
    #[serde(default)]
    pub initial: Option<u64>,
    #[serde(default, rename = "final")]
    pub final_price: Option<u64>,
    #[serde(default)]
    pub discount_percent: Option<u32>,
}

fn object_or_none<'de, D>(deserializer: D) -> Result<Option<AppData>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_object() {
        serde_json::from_value(value).map(Some).map_err(de::Error::custom)
    } else {
        Ok(None)
    }
}

fn minor_to_major(minor: u64) -> f64 {
    minor as f64 / 100.0
}

/// Extracts the price for `app_id` from a raw `appdetails` body.
pub fn parse_price(body: &str, app_id: u64) -> Result<StorefrontPrice, FetchError> {
    let mut response: AppDetailsResponse = serde_json::from_str(body)?;

    let envelope = response
        .remove(&app_id.to_string())
        .ok_or_else(|| FetchError::DataAbsent(format!("app {} not in response", app_id)))?;

    if !envelope.success {
        return Err(FetchError::DataAbsent(format!("app {} not available", app_id)));
    }

    let overview = envelope
        .data
        .and_then(|d| d.price_overview)
        .ok_or_else(|| FetchError::DataAbsent("no price_overview".to_string()))?;

    // A zero final price means free or unpriced; neither is comparable.
    let final_price = overview
        .final_price
        .filter(|p| *p > 0)
        .ok_or_else(|| FetchError::DataAbsent("no final price".to_string()))?;

    let currency = overview
        .currency
        .filter(|c| !c.is_empty())
        .ok_or_else(|| FetchError::DataAbsent("no currency".to_string()))?;

    Ok(StorefrontPrice {
        observed_price: minor_to_major(final_price),
        currency,
        initial_price: overview.initial.map(minor_to_major),
        discount_percent: overview.discount_percent,
    })
}
