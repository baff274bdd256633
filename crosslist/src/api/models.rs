//! Request and response bodies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::CrossListContext;
use crate::api::error::ApiError;
use crate::domain::Platform;
use crate::listings::{CrossListResult, ProductListingView};

/// Parses platform names case-insensitively, rejecting unknown ones.
pub fn parse_platform(raw: &str) -> Result<Platform, ApiError> {
    Platform::parse(raw.trim())
        .ok_or_else(|| ApiError::validation(format!("Unknown platform '{raw}'")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossListRequest {
    pub product_id: String,
    pub platforms: Vec<String>,
    #[serde(flatten)]
    pub context: CrossListContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossListResponse {
    pub product_id: String,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<CrossListResult>,
}

impl CrossListResponse {
    pub fn new(product_id: String, results: Vec<CrossListResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            product_id,
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListingsQuery {
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListingsResponse {
    pub product_id: String,
    pub listings: Vec<ProductListingView>,
    pub connected_platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveListingResponse {
    pub platform: Platform,
    pub external_id: String,
    pub status: crate::domain::ListingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
    pub state: String,
}

/// Query string the platform appends when redirecting back.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedResponse {
    pub platform: Platform,
    pub connection_id: String,
    pub store_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyLinkRequest {
    pub api_key: String,
    /// AuctionFlex company id.
    #[serde(default, alias = "storeId")]
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleWebhookRequest {
    pub external_id: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSyncQuery {
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventResponse {
    pub event_id: String,
}
