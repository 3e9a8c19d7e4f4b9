//! World Bank indicators API: PPP factors and macro series.

pub mod client;
pub mod models;

pub use client::{IndicatorSource, PppSource, WorldBankClient};
pub use models::{Indicator, Observation};
