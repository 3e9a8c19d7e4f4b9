//! HTTP client for the Steam storefront `appdetails` API.

use super::models::{self, StorefrontPrice};
use crate::config::Config;
use crate::error::FetchError;
use crate::regions::RegionCode;
use crate::throttle::Throttle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

/// Source of regional storefront prices - enables mocking for tests.
#[async_trait]
pub trait StorefrontSource: Send + Sync {
    /// Fetches the price of `app_id` in `region`'s store.
    async fn storefront_price(
        &self,
        app_id: u64,
        region: &RegionCode,
    ) -> Result<StorefrontPrice, FetchError>;
}

/// Steam storefront client with request spacing.
pub struct SteamClient {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl SteamClient {
    /// Creates a client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build Steam HTTP client")?;

        Ok(Self {
            client,
            base_url: config.steam_base_url.trim_end_matches('/').to_string(),
            throttle: Throttle::new(config.delay_ms, config.delay_jitter_ms),
        })
    }

    fn appdetails_url(&self, app_id: u64, region: &RegionCode) -> String {
        format!(
            "{}/api/appdetails?appids={}&cc={}&filters=price_overview",
            self.base_url,
            app_id,
            region.to_lowercase()
        )
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.throttle.wait().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "application/json")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 429 {
            return Err(FetchError::Network("rate limited by Steam (429)".to_string()));
        }

        if !status.is_success() {
            return Err(FetchError::Network(format!("Steam returned status: {}", status)));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl StorefrontSource for SteamClient {
    async fn storefront_price(
        &self,
        app_id: u64,
        region: &RegionCode,
    ) -> Result<StorefrontPrice, FetchError> {
        let body = self.get(&self.appdetails_url(app_id, region)).await?;
        models::parse_price(&body, app_id)
    }
}
