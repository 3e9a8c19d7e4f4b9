//! HTTP client for the World Bank v2 indicators API.

use super::models::{self, Indicator, Observation};
use crate::config::Config;
use crate::error::FetchError;
use crate::regions::RegionCode;
use crate::throttle::Throttle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;
use wreq::Client;

/// Source of PPP conversion factors - enables mocking for tests.
#[async_trait]
pub trait PppSource: Send + Sync {
    /// Fetches the PPP conversion factor for `region`.
    async fn ppp_factor(&self, region: &RegionCode) -> Result<f64, FetchError>;
}

/// Source of yearly indicator series.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn series(
        &self,
        region: &RegionCode,
        indicator: Indicator,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<Observation>, FetchError>;
}

/// World Bank client sharing one throttle across PPP and series calls.
pub struct WorldBankClient {
    client: Client,
    base_url: String,
    ppp_year: Option<i32>,
    throttle: Throttle,
}

impl WorldBankClient {
    /// Creates a client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build World Bank HTTP client")?;

        Ok(Self {
            client,
            base_url: config.worldbank_base_url.trim_end_matches('/').to_string(),
            ppp_year: config.ppp_year,
            throttle: Throttle::new(config.delay_ms, config.delay_jitter_ms),
        })
    }

    fn indicator_url(&self, region: &RegionCode, indicator: Indicator) -> String {
        format!(
            "{}/v2/country/{}/indicator/{}?format=json",
            self.base_url,
            region.as_str(),
            indicator.code()
        )
    }

    /// Without a pinned year, `mrnev=1` returns the most recent non-empty value.
    fn ppp_url(&self, region: &RegionCode) -> String {
        let base = self.indicator_url(region, Indicator::Ppp);
        match self.ppp_year {
            Some(year) => format!("{}&date={}", base, year),
            None => format!("{}&mrnev=1", base),
        }
    }

    fn series_url(&self, region: &RegionCode, indicator: Indicator, years: &RangeInclusive<i32>) -> String {
        format!(
            "{}&per_page=1000&date={}:{}",
            self.indicator_url(region, indicator),
            years.start(),
            years.end()
        )
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.throttle.wait().await;

        debug!("GET {}", url);

        let response = self.client.get(url).header("Accept", "application/json").send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "World Bank returned status: {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PppSource for WorldBankClient {
    async fn ppp_factor(&self, region: &RegionCode) -> Result<f64, FetchError> {
        let body = self.get(&self.ppp_url(region)).await?;
        models::parse_ppp(&body)
    }
}

#[async_trait]
impl IndicatorSource for WorldBankClient {
    async fn series(
        &self,
        region: &RegionCode,
        indicator: Indicator,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<Observation>, FetchError> {
        let body = self.get(&self.series_url(region, indicator, &years)).await?;
        models::parse_series(&body, indicator)
    }
}
