//! Steam storefront pricing: HTTP client and response models.

pub mod client;
pub mod models;

pub use client::{SteamClient, StorefrontSource};
pub use models::StorefrontPrice;
