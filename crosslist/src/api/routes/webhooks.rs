//! Sale notifications pushed by the platforms.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SaleWebhookRequest, parse_platform};
use crate::api::server::AppState;
use crate::listings::SaleConfirmation;

pub const SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router<AppState> {
    Router::new().route("/{platform}/sale", post(sale))
}

/// Records a sale and closes the product's other listings.
///
/// Repeated notifications for the same sale are answered with
/// `alreadyRecorded: true`.
async fn sale(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SaleWebhookRequest>,
) -> ApiResult<Json<SaleConfirmation>> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secrets_match(secret, provided) {
            warn!("Webhook rejected: bad secret");
            return Err(ApiError::unauthorized("Invalid webhook secret"));
        }
    }

    let platform = parse_platform(&platform)?;
    let external_id = request.external_id.trim();
    if external_id.is_empty() {
        return Err(ApiError::validation("externalId is required"));
    }
    if request.amount.is_some_and(|a| a.is_sign_negative()) {
        return Err(ApiError::validation("amount must not be negative"));
    }

    let confirmation = state
        .sync
        .confirm_sale(platform, external_id, request.amount)
        .await?;
    Ok(Json(confirmation))
}

/// Constant-time comparison of the SHA-256 digests.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let provided = Sha256::digest(provided.as_bytes());
    expected
        .iter()
        .zip(provided.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
