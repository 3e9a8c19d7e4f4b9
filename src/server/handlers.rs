//! Request handlers and the API error type.

use super::AppState;
use crate::normalizer::{ProductQuery, RankBy, RegionPriceRecord};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned to API clients as `{"error": message}`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("No app_id provided")]
    MissingAppId,

    #[error("app_id must be a positive integer")]
    InvalidAppId,

    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// One priced region in the response array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub country: String,
    pub currency: String,
    pub price: f64,
    pub price_ppp_usd: f64,
}

impl PriceEntry {
    fn from_record(record: &RegionPriceRecord) -> Option<Self> {
        Some(Self {
            country: record.region_code().to_string(),
            currency: record.currency().to_string(),
            price: record.observed_price(),
            price_ppp_usd: record.adjusted_price()?,
        })
    }
}

/// Reads `app_id` from the request body. Accepts a JSON number or a
/// numeric string; missing, null, empty and zero count as not provided.
pub fn parse_app_id(body: &Value) -> Result<u64, ApiError> {
    let id = match body.get("app_id") {
        None | Some(Value::Null) => return Err(ApiError::MissingAppId),
        Some(Value::Number(n)) => n.as_u64().ok_or(ApiError::InvalidAppId)?,
        Some(Value::String(s)) if s.trim().is_empty() => return Err(ApiError::MissingAppId),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| ApiError::InvalidAppId)?,
        Some(_) => return Err(ApiError::InvalidAppId),
    };

    if id == 0 {
        return Err(ApiError::MissingAppId);
    }
    Ok(id)
}

/// `POST /api/get_prices`
pub async fn get_prices(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<PriceEntry>>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection);
        ApiError::InvalidBody
    })?;
    let app_id = parse_app_id(&body)?;

    let query = ProductQuery::new(app_id, state.regions.iter().cloned())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let records = state.normalizer.normalize(&query, RankBy::AdjustedPrice).await;

    info!("Priced app {} in {} regions", app_id, records.len());
    Ok(Json(records.iter().filter_map(PriceEntry::from_record).collect()))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
