//! steam-ppp - Steam regional prices normalized by purchasing power parity
//!
//! Fetches a game's storefront price in many regions, divides by the World
//! Bank PPP conversion factor, and ranks regions by the adjusted price. Also
//! exports batch CSV datasets, fits a linear model on them, and serves the
//! comparison over HTTP.

pub mod cache;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod normalizer;
pub mod regions;
pub mod regression;
pub mod server;
pub mod steam;
pub mod throttle;
pub mod worldbank;

pub use config::Config;
pub use error::FetchError;
pub use normalizer::{PriceNormalizer, ProductQuery, RankBy, RegionPriceRecord};
pub use regions::RegionCode;
