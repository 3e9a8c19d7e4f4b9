//! PPP price normalization: fetch regional prices, adjust, rank.
//!
//! Every region is an independent unit of work. A region whose storefront
//! fetch fails is left out of the result and reported in
//! [`NormalizeReport::omitted`]; nothing is raised to the caller.

use crate::config::Config;
use crate::error::FetchError;
use crate::regions::RegionCode;
use crate::steam::{StorefrontPrice, StorefrontSource};
use crate::worldbank::PppSource;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Product and regions to price. Input only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    product_id: u64,
    regions: Vec<RegionCode>,
}

impl ProductQuery {
    /// Validates the product id and drops duplicate regions, keeping the
    /// first occurrence.
    pub fn new(product_id: u64, regions: impl IntoIterator<Item = RegionCode>) -> Result<Self> {
        if product_id == 0 {
            anyhow::bail!("Invalid product id: 0. Steam app ids are positive integers.");
        }

        let mut seen = HashSet::new();
        let regions = regions.into_iter().filter(|r| seen.insert(r.clone())).collect();

        Ok(Self { product_id, regions })
    }

    pub fn product_id(&self) -> u64 {
        self.product_id
    }

    pub fn regions(&self) -> &[RegionCode] {
        &self.regions
    }
}

/// Price of one product in one region. Only built through [`Self::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPriceRecord {
    region_code: RegionCode,
    currency: String,
    observed_price: f64,
    ppp_factor: Option<f64>,
    adjusted_price: Option<f64>,
}

impl RegionPriceRecord {
    /// Builds a record, deriving the adjusted price from a present, non-zero
    /// PPP factor.
    pub fn new(
        region_code: RegionCode,
        currency: impl Into<String>,
        observed_price: f64,
        ppp_factor: Option<f64>,
    ) -> Self {
        let adjusted_price = ppp_factor
            .filter(|f| *f != 0.0 && f.is_finite())
            .map(|f| round_cents(observed_price / f));

        Self { region_code, currency: currency.into(), observed_price, ppp_factor, adjusted_price }
    }

    pub fn region_code(&self) -> &RegionCode {
        &self.region_code
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn observed_price(&self) -> f64 {
        self.observed_price
    }

    pub fn ppp_factor(&self) -> Option<f64> {
        self.ppp_factor
    }

    pub fn adjusted_price(&self) -> Option<f64> {
        self.adjusted_price
    }
}

/// Rounds half away from zero to two decimals. Deliberately not banker's
/// rounding: 0.125 becomes 0.13.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Which price the result is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    /// Comparison mode: PPP is fetched and records without an adjusted
    /// price are dropped.
    #[default]
    AdjustedPrice,
    /// Raw export mode: PPP is not fetched, every priced region is kept.
    ObservedPrice,
}

impl RankBy {
    fn key(&self, record: &RegionPriceRecord) -> Option<f64> {
        match self {
            RankBy::AdjustedPrice => record.adjusted_price,
            RankBy::ObservedPrice => Some(record.observed_price),
        }
    }

    fn needs_ppp(&self) -> bool {
        matches!(self, RankBy::AdjustedPrice)
    }
}

/// Outcome of a normalization run including the regions left out.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub records: Vec<RegionPriceRecord>,
    pub omitted: Vec<(RegionCode, FetchError)>,
}

/// Tuning for the per-region fan-out.
#[derive(Debug, Clone, Copy)]
pub struct NormalizerOptions {
    /// Regions in flight at once
    pub max_concurrency: usize,
    /// Extra attempts after a network failure
    pub retries: u32,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self { max_concurrency: 4, retries: 0 }
    }
}

impl From<&Config> for NormalizerOptions {
    fn from(config: &Config) -> Self {
        Self { max_concurrency: config.max_concurrency.max(1), retries: config.retries }
    }
}

enum RegionOutcome {
    Priced(RegionPriceRecord),
    Omitted(RegionCode, FetchError),
}

/// Composes a storefront source and a PPP source into ranked records.
#[derive(Clone)]
pub struct PriceNormalizer {
    storefront: Arc<dyn StorefrontSource>,
    ppp: Arc<dyn PppSource>,
    options: NormalizerOptions,
}

impl PriceNormalizer {
    pub fn new(
        storefront: Arc<dyn StorefrontSource>,
        ppp: Arc<dyn PppSource>,
        options: NormalizerOptions,
    ) -> Self {
        Self { storefront, ppp, options }
    }

    /// Returns the ranked records; failed regions are silently absent.
    pub async fn normalize(&self, query: &ProductQuery, rank: RankBy) -> Vec<RegionPriceRecord> {
        self.normalize_detailed(query, rank).await.records
    }

    /// Returns the ranked records together with every omitted region.
    pub async fn normalize_detailed(&self, query: &ProductQuery, rank: RankBy) -> NormalizeReport {
        info!(
            product_id = query.product_id(),
            regions = query.regions().len(),
            "Normalizing prices"
        );

        // `buffered` yields in input order, which keeps the sort below stable
        // relative to the caller's region order.
        let outcomes: Vec<RegionOutcome> = stream::iter(query.regions().iter().cloned())
            .map(|region| self.price_region(query.product_id(), region, rank))
            .buffered(self.options.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = NormalizeReport::default();
        for outcome in outcomes {
            match outcome {
                RegionOutcome::Priced(record) => report.records.push(record),
                RegionOutcome::Omitted(region, err) => report.omitted.push((region, err)),
            }
        }

        rank_records(&mut report.records, rank);

        info!(
            priced = report.records.len(),
            omitted = report.omitted.len(),
            "Normalization finished"
        );
        report
    }

    async fn price_region(&self, app_id: u64, region: RegionCode, rank: RankBy) -> RegionOutcome {
        let price: StorefrontPrice = match self
            .with_retries(|| self.storefront.storefront_price(app_id, &region))
            .await
        {
            Ok(price) => price,
            Err(err) => {
                warn!(region = %region, kind = err.kind(), "Storefront fetch failed: {}", err);
                return RegionOutcome::Omitted(region, err);
            }
        };

        let ppp_factor = if rank.needs_ppp() {
            match self.with_retries(|| self.ppp.ppp_factor(&region)).await {
                Ok(factor) => Some(factor),
                Err(err) => {
                    warn!(region = %region, kind = err.kind(), "PPP fetch failed: {}", err);
                    None
                }
            }
        } else {
            None
        };

        debug!(region = %region, price = price.observed_price, ?ppp_factor, "Region priced");
        RegionOutcome::Priced(RegionPriceRecord::new(
            region,
            price.currency,
            price.observed_price,
            ppp_factor,
        ))
    }

    async fn with_retries<T, F, Fut>(&self, mut call: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.options.retries => {
                    attempt += 1;
                    debug!(attempt, "Retrying after: {}", err);
                }
                other => return other,
            }
        }
    }
}

/// Drops records without a rank key and sorts ascending. `sort_by` is
/// stable, so ties keep their input order.
pub fn rank_records(records: &mut Vec<RegionPriceRecord>, rank: RankBy) {
    records.retain(|r| rank.key(r).is_some());
    records.sort_by(|a, b| {
        let (ka, kb) = (rank.key(a).unwrap_or(f64::MAX), rank.key(b).unwrap_or(f64::MAX));
        ka.total_cmp(&kb)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock sources keyed by region code.
    #[derive(Default)]
    struct MockStorefront {
        prices: HashMap<String, (f64, &'static str)>,
        failures: HashMap<String, FetchError>,
        calls: AtomicUsize,
    }

    impl MockStorefront {
        fn with(prices: &[(&str, f64, &'static str)]) -> Self {
            Self {
                prices: prices.iter().map(|(r, p, c)| (r.to_string(), (*p, *c))).collect(),
                ..Self::default()
            }
        }

        fn failing(mut self, region: &str, err: FetchError) -> Self {
            self.failures.insert(region.to_string(), err);
            self
        }
    }

    #[async_trait]
    impl StorefrontSource for MockStorefront {
        async fn storefront_price(
            &self,
            _app_id: u64,
            region: &RegionCode,
        ) -> Result<StorefrontPrice, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failures.get(region.as_str()) {
                return Err(err.clone());
            }
            match self.prices.get(region.as_str()) {
                Some((price, currency)) => Ok(StorefrontPrice {
                    observed_price: *price,
                    currency: currency.to_string(),
                    initial_price: None,
                    discount_percent: None,
                }),
                None => Err(FetchError::DataAbsent("no price_overview".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MockPpp {
        factors: HashMap<String, f64>,
        calls: AtomicUsize,
    }

    impl MockPpp {
        fn with(factors: &[(&str, f64)]) -> Self {
            Self {
                factors: factors.iter().map(|(r, f)| (r.to_string(), *f)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PppSource for MockPpp {
        async fn ppp_factor(&self, region: &RegionCode) -> Result<f64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.factors
                .get(region.as_str())
                .copied()
                .ok_or_else(|| FetchError::DataAbsent("PPP value is null".to_string()))
        }
    }

    /// Fails with a network error until `fail_times` calls have been made.
    struct FlakyStorefront {
        fail_times: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StorefrontSource for FlakyStorefront {
        async fn storefront_price(
            &self,
            _app_id: u64,
            _region: &RegionCode,
        ) -> Result<StorefrontPrice, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(FetchError::Network("timeout".to_string()))
            } else {
                Ok(StorefrontPrice {
                    observed_price: 10.0,
                    currency: "USD".to_string(),
                    initial_price: None,
                    discount_percent: None,
                })
            }
        }
    }

    /// Same price everywhere; each region answers after its own delay and
    /// the peak number of calls in flight is tracked.
    #[derive(Default)]
    struct SlowStorefront {
        delays_ms: HashMap<String, u64>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowStorefront {
        fn with(delays: &[(&str, u64)]) -> Self {
            Self {
                delays_ms: delays.iter().map(|(r, d)| (r.to_string(), *d)).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl StorefrontSource for SlowStorefront {
        async fn storefront_price(
            &self,
            _app_id: u64,
            region: &RegionCode,
        ) -> Result<StorefrontPrice, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms.get(region.as_str()).copied().unwrap_or(0);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(StorefrontPrice {
                observed_price: 10.0,
                currency: "USD".to_string(),
                initial_price: None,
                discount_percent: None,
            })
        }
    }

    fn slow_regions() -> SlowStorefront {
        SlowStorefront::with(&[
            ("US", 60),
            ("PL", 50),
            ("DE", 40),
            ("BR", 30),
            ("IN", 20),
            ("TR", 10),
        ])
    }

    fn regions(codes: &[&str]) -> Vec<RegionCode> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn normalizer(storefront: MockStorefront, ppp: MockPpp) -> PriceNormalizer {
        PriceNormalizer::new(Arc::new(storefront), Arc::new(ppp), NormalizerOptions::default())
    }

    fn codes(records: &[RegionPriceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.region_code().as_str()).collect()
    }

    #[test]
    fn test_query_rejects_zero() {
        assert!(ProductQuery::new(0, regions(&["US"])).is_err());
    }

    #[test]
    fn test_query_dedupes_regions() {
        let query = ProductQuery::new(1, regions(&["US", "PL", "us", "DE", "PL"])).unwrap();
        assert_eq!(query.regions(), regions(&["US", "PL", "DE"]).as_slice());
    }

    #[test]
    fn test_record_adjusted_price() {
        let record = RegionPriceRecord::new("PL".parse().unwrap(), "PLN", 199.0, Some(1.8));
        assert_eq!(record.adjusted_price(), Some(110.56));
        assert_eq!(record.ppp_factor(), Some(1.8));
        assert_eq!(record.currency(), "PLN");
    }

    #[test]
    fn test_record_zero_or_missing_ppp() {
        let zero = RegionPriceRecord::new("US".parse().unwrap(), "USD", 10.0, Some(0.0));
        assert!(zero.adjusted_price().is_none());

        let missing = RegionPriceRecord::new("US".parse().unwrap(), "USD", 10.0, None);
        assert!(missing.adjusted_price().is_none());
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(110.5555), 110.56);
        assert_eq!(round_cents(59.99), 59.99);
        assert_eq!(round_cents(0.004), 0.0);
        assert_eq!(round_cents(0.125), 0.13);
        assert_eq!(round_cents(0.375), 0.38);
    }

    #[tokio::test]
    async fn test_us_pl_scenario() {
        let n = normalizer(
            MockStorefront::with(&[("US", 59.99, "USD"), ("PL", 199.0, "PLN")]),
            MockPpp::with(&[("US", 1.0), ("PL", 1.8)]),
        );
        let query = ProductQuery::new(1091500, regions(&["PL", "US"])).unwrap();

        let records = n.normalize(&query, RankBy::AdjustedPrice).await;

        assert_eq!(codes(&records), vec!["US", "PL"]);
        assert_eq!(records[0].adjusted_price(), Some(59.99));
        assert_eq!(records[1].adjusted_price(), Some(110.56));
    }

    #[tokio::test]
    async fn test_failed_region_is_omitted() {
        let n = normalizer(
            MockStorefront::with(&[("US", 59.99, "USD")])
                .failing("XX", FetchError::Network("connection refused".to_string())),
            MockPpp::with(&[("US", 1.0)]),
        );
        let query = ProductQuery::new(1091500, regions(&["XX", "US"])).unwrap();

        let report = n.normalize_detailed(&query, RankBy::AdjustedPrice).await;

        assert_eq!(codes(&report.records), vec!["US"]);
        assert_eq!(report.omitted.len(), 1);
        assert_eq!(report.omitted[0].0.as_str(), "XX");
        assert!(matches!(report.omitted[0].1, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_missing_ppp_dropped_in_comparison_mode() {
        let n = normalizer(
            MockStorefront::with(&[("US", 59.99, "USD"), ("RU", 1999.0, "RUB"), ("CN", 298.0, "CNY")]),
            MockPpp::with(&[("US", 1.0), ("CN", 0.0)]),
        );
        let query = ProductQuery::new(1, regions(&["US", "RU", "CN"])).unwrap();

        let records = n.normalize(&query, RankBy::AdjustedPrice).await;

        assert_eq!(codes(&records), vec!["US"]);
        assert!(records.iter().all(|r| r.ppp_factor().is_some_and(|f| f != 0.0)));
    }

    #[tokio::test]
    async fn test_observed_mode_keeps_all_and_skips_ppp() {
        let ppp = Arc::new(MockPpp::with(&[("US", 1.0)]));
        let n = PriceNormalizer::new(
            Arc::new(MockStorefront::with(&[
                ("US", 59.99, "USD"),
                ("PL", 199.0, "PLN"),
                ("BR", 199.9, "BRL"),
            ])),
            ppp.clone(),
            NormalizerOptions::default(),
        );
        let query = ProductQuery::new(1, regions(&["PL", "BR", "US"])).unwrap();

        let records = n.normalize(&query, RankBy::ObservedPrice).await;

        assert_eq!(codes(&records), vec!["US", "PL", "BR"]);
        assert!(records.iter().all(|r| r.adjusted_price().is_none()));
        assert_eq!(ppp.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ties_keep_input_order() {
        let n = normalizer(
            MockStorefront::with(&[("DE", 50.0, "EUR"), ("FR", 50.0, "EUR"), ("IT", 50.0, "EUR")]),
            MockPpp::with(&[("DE", 1.0), ("FR", 1.0), ("IT", 1.0)]),
        );

        let query = ProductQuery::new(1, regions(&["FR", "IT", "DE"])).unwrap();
        let records = n.normalize(&query, RankBy::AdjustedPrice).await;
        assert_eq!(codes(&records), vec!["FR", "IT", "DE"]);

        let query = ProductQuery::new(1, regions(&["IT", "DE", "FR"])).unwrap();
        let records = n.normalize(&query, RankBy::ObservedPrice).await;
        assert_eq!(codes(&records), vec!["IT", "DE", "FR"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_follow_input_order_not_completion_order() {
        let order = ["US", "PL", "DE", "BR", "IN", "TR"];
        let ppp = MockPpp::with(&order.map(|c| (c, 1.0)));
        let normalizer = PriceNormalizer::new(
            Arc::new(slow_regions()),
            Arc::new(ppp),
            NormalizerOptions { max_concurrency: 3, retries: 0 },
        );
        let query = ProductQuery::new(1, regions(&order)).unwrap();

        let records = normalizer.normalize(&query, RankBy::AdjustedPrice).await;
        assert_eq!(codes(&records), order.to_vec());

        let raw = normalizer.normalize(&query, RankBy::ObservedPrice).await;
        assert_eq!(codes(&raw), order.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_regions_capped() {
        let storefront = Arc::new(slow_regions());
        let normalizer = PriceNormalizer::new(
            storefront.clone(),
            Arc::new(MockPpp::default()),
            NormalizerOptions { max_concurrency: 3, retries: 0 },
        );
        let query = ProductQuery::new(1, regions(&["US", "PL", "DE", "BR", "IN", "TR"])).unwrap();

        let records = normalizer.normalize(&query, RankBy::ObservedPrice).await;

        assert_eq!(records.len(), 6);
        assert_eq!(storefront.peak.load(Ordering::SeqCst), 3);
        assert_eq!(storefront.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_result_sorted_and_rounded() {
        let n = normalizer(
            MockStorefront::with(&[
                ("US", 59.99, "USD"),
                ("PL", 199.0, "PLN"),
                ("BR", 199.9, "BRL"),
                ("JP", 8778.0, "JPY"),
                ("GB", 49.99, "GBP"),
            ]),
            MockPpp::with(&[("US", 1.0), ("PL", 1.8), ("BR", 2.5), ("JP", 94.6), ("GB", 0.67)]),
        );
        let query = ProductQuery::new(1, regions(&["US", "PL", "BR", "JP", "GB"])).unwrap();

        let records = n.normalize(&query, RankBy::AdjustedPrice).await;

        assert_eq!(records.len(), 5);
        for pair in records.windows(2) {
            assert!(pair[0].adjusted_price() <= pair[1].adjusted_price());
        }
        for r in &records {
            let expected = round_cents(r.observed_price() / r.ppp_factor().unwrap());
            assert!((r.adjusted_price().unwrap() - expected).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_empty_regions() {
        let storefront = Arc::new(MockStorefront::with(&[("US", 1.0, "USD")]));
        let n = PriceNormalizer::new(
            storefront.clone(),
            Arc::new(MockPpp::default()),
            NormalizerOptions::default(),
        );
        let query = ProductQuery::new(1, Vec::new()).unwrap();

        assert!(n.normalize(&query, RankBy::AdjustedPrice).await.is_empty());
        assert_eq!(storefront.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_total_failure_is_empty() {
        let n = normalizer(MockStorefront::default(), MockPpp::default());
        let query = ProductQuery::new(1, regions(&["US", "PL"])).unwrap();

        let report = n.normalize_detailed(&query, RankBy::AdjustedPrice).await;
        assert!(report.records.is_empty());
        assert_eq!(report.omitted.len(), 2);
    }

    #[tokio::test]
    async fn test_network_errors_retried() {
        let flaky = Arc::new(FlakyStorefront { fail_times: 2, calls: AtomicUsize::new(0) });
        let n = PriceNormalizer::new(
            flaky.clone(),
            Arc::new(MockPpp::with(&[("US", 1.0)])),
            NormalizerOptions { max_concurrency: 1, retries: 2 },
        );
        let query = ProductQuery::new(1, regions(&["US"])).unwrap();

        let records = n.normalize(&query, RankBy::AdjustedPrice).await;
        assert_eq!(records.len(), 1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let flaky = Arc::new(FlakyStorefront { fail_times: 1, calls: AtomicUsize::new(0) });
        let n = PriceNormalizer::new(
            flaky.clone(),
            Arc::new(MockPpp::with(&[("US", 1.0)])),
            NormalizerOptions::default(),
        );
        let query = ProductQuery::new(1, regions(&["US"])).unwrap();

        assert!(n.normalize(&query, RankBy::AdjustedPrice).await.is_empty());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_data_absent_not_retried() {
        let storefront = Arc::new(MockStorefront::default());
        let n = PriceNormalizer::new(
            storefront.clone(),
            Arc::new(MockPpp::default()),
            NormalizerOptions { max_concurrency: 2, retries: 3 },
        );
        let query = ProductQuery::new(1, regions(&["US"])).unwrap();

        n.normalize(&query, RankBy::AdjustedPrice).await;
        assert_eq!(storefront.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = Config { max_concurrency: 0, retries: 2, ..Config::default() };
        let options = NormalizerOptions::from(&config);
        assert_eq!(options.max_concurrency, 1);
        assert_eq!(options.retries, 2);
    }
}
